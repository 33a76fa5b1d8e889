//! Template parsing

use netprov_core::TemplateError;

/// Parsed template tree
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Expr(String),
    If {
        path: String,
        negate: bool,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
    For {
        var: String,
        path: String,
        body: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    Expr(String),
    Tag(String),
}

/// Parse template source into a node tree
pub(crate) fn parse(name: &str, source: &str) -> Result<Vec<Node>, TemplateError> {
    let source = strip_standalone_tags(source);
    let tokens = tokenize(name, &source)?;
    let mut iter = tokens.into_iter();
    let (nodes, terminator) = parse_block(name, &mut iter)?;
    match terminator {
        None => Ok(nodes),
        Some(tag) => Err(malformed(name, format!("unexpected '{{% {} %}}'", tag))),
    }
}

/// Lines holding nothing but block tags or comments vanish entirely,
/// including their line break, so templates can be laid out one
/// statement per line without producing blank commands.
fn strip_standalone_tags(source: &str) -> String {
    let mut output = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        let content = line.trim();
        if !content.is_empty() && is_tag_only(content) {
            output.push_str(content);
        } else {
            output.push_str(line);
        }
    }
    output
}

fn is_tag_only(mut rest: &str) -> bool {
    while !rest.is_empty() {
        let close = if rest.starts_with("{%") {
            "%}"
        } else if rest.starts_with("{#") {
            "#}"
        } else {
            return false;
        };
        match rest.find(close) {
            Some(end) => rest = rest[end + 2..].trim_start(),
            None => return false,
        }
    }
    true
}

fn tokenize(name: &str, source: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut rest = source;

    while !rest.is_empty() {
        let next_open = ["{{", "{%", "{#"]
            .iter()
            .filter_map(|open| rest.find(open).map(|pos| (pos, *open)))
            .min_by_key(|(pos, _)| *pos);

        let Some((pos, open)) = next_open else {
            tokens.push(Token::Text(rest.to_string()));
            break;
        };

        if pos > 0 {
            tokens.push(Token::Text(rest[..pos].to_string()));
        }

        let close = match open {
            "{{" => "}}",
            "{%" => "%}",
            _ => "#}",
        };
        let body_start = pos + open.len();
        let end = rest[body_start..]
            .find(close)
            .ok_or_else(|| malformed(name, format!("unclosed '{}'", open)))?;
        let inner = rest[body_start..body_start + end]
            .trim()
            .trim_matches('-')
            .trim()
            .to_string();

        match open {
            "{{" => {
                if inner.is_empty() {
                    return Err(malformed(name, "empty expression".to_string()));
                }
                tokens.push(Token::Expr(inner));
            }
            "{%" => tokens.push(Token::Tag(inner)),
            _ => {}
        }

        rest = &rest[body_start + end + close.len()..];
    }

    Ok(tokens)
}

/// Parse nodes until a block-closing tag; returns that tag, if any.
fn parse_block(
    name: &str,
    tokens: &mut std::vec::IntoIter<Token>,
) -> Result<(Vec<Node>, Option<String>), TemplateError> {
    let mut nodes = Vec::new();

    while let Some(token) = tokens.next() {
        match token {
            Token::Text(text) => nodes.push(Node::Text(text)),
            Token::Expr(path) => nodes.push(Node::Expr(path)),
            Token::Tag(tag) => {
                let words: Vec<&str> = tag.split_whitespace().collect();
                match words.as_slice() {
                    ["if", "not", path] => nodes.push(parse_if(name, tokens, path, true)?),
                    ["if", path] => nodes.push(parse_if(name, tokens, path, false)?),
                    ["for", var, "in", path] => {
                        let (body, terminator) = parse_block(name, tokens)?;
                        if terminator.as_deref() != Some("endfor") {
                            return Err(malformed(name, format!("'for {}' is not closed", var)));
                        }
                        nodes.push(Node::For {
                            var: var.to_string(),
                            path: path.to_string(),
                            body,
                        });
                    }
                    ["else"] | ["endif"] | ["endfor"] => {
                        return Ok((nodes, Some(words[0].to_string())));
                    }
                    _ => return Err(malformed(name, format!("unknown tag '{}'", tag))),
                }
            }
        }
    }

    Ok((nodes, None))
}

fn parse_if(
    name: &str,
    tokens: &mut std::vec::IntoIter<Token>,
    path: &str,
    negate: bool,
) -> Result<Node, TemplateError> {
    let (then, terminator) = parse_block(name, tokens)?;
    let otherwise = match terminator.as_deref() {
        Some("endif") => Vec::new(),
        Some("else") => {
            let (otherwise, terminator) = parse_block(name, tokens)?;
            if terminator.as_deref() != Some("endif") {
                return Err(malformed(name, format!("'if {}' is not closed", path)));
            }
            otherwise
        }
        _ => return Err(malformed(name, format!("'if {}' is not closed", path))),
    };

    Ok(Node::If {
        path: path.to_string(),
        negate,
        then,
        otherwise,
    })
}

fn malformed(name: &str, message: String) -> TemplateError {
    TemplateError::Malformed {
        name: name.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standalone_tag_lines_are_removed() {
        let stripped = strip_standalone_tags("a\n  {% if x %}\nb\n{% endif %}\nc\n");
        assert_eq!(stripped, "a\n{% if x %}b\n{% endif %}c\n");
    }

    #[test]
    fn test_inline_tags_are_kept_in_place() {
        let stripped = strip_standalone_tags("ip {% if x %}dhcp{% endif %}\n");
        assert_eq!(stripped, "ip {% if x %}dhcp{% endif %}\n");
    }

    #[test]
    fn test_parse_nested_blocks() {
        let nodes = parse(
            "t",
            "{% for s in config.subnets %}{% if s.secondary %}x{% else %}y{% endif %}{% endfor %}",
        )
        .unwrap();
        assert_eq!(nodes.len(), 1);
        match &nodes[0] {
            Node::For { var, path, body } => {
                assert_eq!(var, "s");
                assert_eq!(path, "config.subnets");
                assert!(matches!(body[0], Node::If { negate: false, .. }));
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("t", "{{ config.name").is_err());
        assert!(parse("t", "{% if x %}no end").is_err());
        assert!(parse("t", "{% endif %}").is_err());
        assert!(parse("t", "{% include 'x' %}").is_err());
        assert!(parse("t", "{{ }}").is_err());
    }

    #[test]
    fn test_comments_are_dropped() {
        let nodes = parse("t", "{# note #}\ninterface {{ config.name }}\n").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Text("interface ".to_string()),
                Node::Expr("config.name".to_string()),
                Node::Text("\n".to_string()),
            ]
        );
    }
}
