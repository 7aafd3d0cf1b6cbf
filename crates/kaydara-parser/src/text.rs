//! ASCII FBX front end.
//!
//! The text variant is line oriented:
//!
//! ```text
//! Objects:  {
//!     Model: 3000, "Model::Cube", "Mesh" {        node begin
//!         Version: 232                            property
//!         Properties70:  {
//!             P: "Lcl Translation", "Lcl Translation", "", "A",0,10,0
//!         }
//!     }                                           block end
//!     Geometry: 4001, "Geometry::Cube", "Mesh" {
//!         Vertices: *24 {
//!             a: -1,-1,1,1,-1,1,-1,1,1,1,1,1,
//! -1,1,-1,1,1,-1,-1,-1,-1,1,-1,-1                 continuation
//!         }
//!     }
//! }
//! ```
//!
//! Nesting is tracked with an explicit node stack, so indentation is only
//! informational. Property values may wrap over several lines; a value stays
//! open until the next key or block end.

use kaydara_core::{FbxError, FbxTree, Node, NodeId, Property, Result, SourceFormat};
use log::{debug, warn};

use crate::lexer::{key, split_lines, tokens, Line, Token};

/// Oldest ASCII version the parser accepts.
const MIN_VERSION: u32 = 7000;

/// Read the `FBXVersion: NNNN` header of an ASCII document.
pub fn ascii_version(text: &str) -> Result<u32> {
    const KEY: &str = "FBXVersion:";
    let start = text.find(KEY).ok_or(FbxError::MissingVersion)? + KEY.len();
    let digits: String = text[start..]
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().map_err(|_| FbxError::MissingVersion)
}

/// A property line whose value may still continue on following lines.
struct PendingProperty {
    name: String,
    value: String,
    line: usize,
}

/// Parser for ASCII documents.
pub struct TextParser<'a> {
    text: &'a str,
}

impl<'a> TextParser<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    /// Parse the whole document into a tree.
    pub fn parse(self) -> Result<FbxTree> {
        let version = ascii_version(self.text)?;
        if version < MIN_VERSION {
            return Err(FbxError::UnsupportedVersion {
                version,
                minimum: MIN_VERSION,
            });
        }
        debug!("Parsing ASCII FBX version {}", version);

        let lines = split_lines(self.text);
        let mut state = ParseState::new(&lines, FbxTree::new(version, SourceFormat::Ascii));
        state.run()?;
        Ok(state.tree)
    }
}

/// Per-call parse state: the line cursor, the open node stack and the tree
/// being filled.
struct ParseState<'a> {
    lines: &'a [Line<'a>],
    pos: usize,
    stack: Vec<Node>,
    pending: Option<PendingProperty>,
    tree: FbxTree,
}

impl<'a> ParseState<'a> {
    fn new(lines: &'a [Line<'a>], tree: FbxTree) -> Self {
        Self {
            lines,
            pos: 0,
            stack: Vec::new(),
            pending: None,
            tree,
        }
    }

    fn current(&self) -> Option<&'a Line<'a>> {
        self.lines.get(self.pos)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn run(&mut self) -> Result<()> {
        while let Some(line) = self.current() {
            self.parse_line(line)?;
            self.advance();
        }

        self.flush_pending()?;
        if !self.stack.is_empty() {
            warn!("{} unclosed block(s) at end of ASCII FBX", self.stack.len());
            while !self.stack.is_empty() {
                self.pop_node();
            }
        }
        Ok(())
    }

    fn parse_line(&mut self, line: &Line<'a>) -> Result<()> {
        let content = line.content;

        if content.starts_with('}') {
            self.flush_pending()?;
            if self.stack.is_empty() {
                return Err(FbxError::MalformedLine {
                    line: line.line_number,
                    reason: "unbalanced closing brace".into(),
                });
            }
            self.pop_node();
            return Ok(());
        }

        if let Ok((rest, name)) = key(content) {
            self.flush_pending()?;
            let rest = rest.trim();
            if let Some(attrs) = rest.strip_suffix('{') {
                return self.begin_node(name, attrs, line.line_number);
            }
            self.pending = Some(PendingProperty {
                name: name.to_string(),
                value: rest.to_string(),
                line: line.line_number,
            });
            return Ok(());
        }

        match self.pending.as_mut() {
            Some(pending) => {
                if !pending.value.is_empty() && !pending.value.ends_with(',') {
                    pending.value.push(',');
                }
                pending.value.push_str(content);
            }
            None => warn!("Ignoring stray line {}: {}", line.line_number, content),
        }
        Ok(())
    }

    /// `Name: id, "Class::Name", "Type" {`
    fn begin_node(&mut self, name: &str, attrs: &str, line: usize) -> Result<()> {
        let attrs = tokenize(attrs, line)?;
        let mut attrs = attrs.into_iter().filter(|t| !matches!(t, Token::Count(_)));

        let mut node = Node::new(name);
        node.id = match attrs.next() {
            Some(Token::Int(id)) => Some(NodeId::Int(id)),
            Some(Token::Str(s)) | Some(Token::Word(s)) if !s.is_empty() => Some(NodeId::Name(s)),
            _ => None,
        };

        // Binary names are cut at the NUL before the class, so drop it here too.
        let rest: Vec<Token> = attrs
            .enumerate()
            .map(|(i, token)| match token {
                Token::Str(s) if i == 0 => Token::Str(strip_class_prefix(&s).to_string()),
                other => other,
            })
            .collect();
        node.attr_name = rest
            .first()
            .and_then(token_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        node.attr_type = rest
            .get(1)
            .and_then(token_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        if let Some(id) = &node.id {
            node.properties.push(match id {
                NodeId::Int(id) => Property::I64(*id),
                NodeId::Name(name) => Property::String(name.clone()),
            });
        }
        node.properties.extend(rest.into_iter().map(into_property));

        self.stack.push(node);
        Ok(())
    }

    fn pop_node(&mut self) {
        let Some(mut node) = self.stack.pop() else {
            return;
        };
        fold_array(&mut node);
        self.attach(node);
    }

    fn attach(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(parent) => parent.add_child(node),
            None => self.tree.add(node),
        }
    }

    fn flush_pending(&mut self) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let values = tokenize(&pending.value, pending.line)?;

        let mut node = Node::new(pending.name.as_str());
        node.properties = match pending.name.as_str() {
            "a" => vec![numeric_array(&values)],
            "Content" => vec![Property::String(
                values.iter().filter_map(token_str).collect::<String>(),
            )],
            _ => values.into_iter().map(into_property).collect(),
        };
        self.attach(node);
        Ok(())
    }
}

fn tokenize(input: &str, line: usize) -> Result<Vec<Token>> {
    tokens(input).map_err(|rest| FbxError::MalformedLine {
        line,
        reason: format!("cannot tokenize `{}`", rest),
    })
}

fn token_str(token: &Token) -> Option<&str> {
    match token {
        Token::Str(s) | Token::Word(s) => Some(s),
        _ => None,
    }
}

/// `Model::Cube` -> `Cube`
fn strip_class_prefix(name: &str) -> &str {
    match name.split_once("::") {
        Some((class, rest))
            if !class.is_empty() && class.chars().all(|c| c.is_alphanumeric() || c == '_') =>
        {
            rest
        }
        _ => name,
    }
}

fn into_property(token: Token) -> Property {
    match token {
        Token::Str(s) | Token::Word(s) => Property::String(s),
        Token::Int(v) => Property::I64(v),
        Token::Float(v) => Property::F64(v),
        Token::Count(n) => Property::I64(n as i64),
    }
}

/// `a:` payloads become integer arrays when every value is integral.
fn numeric_array(values: &[Token]) -> Property {
    let ints: Option<Vec<i64>> = values
        .iter()
        .map(|t| match t {
            Token::Int(v) => Some(*v),
            _ => None,
        })
        .collect();
    if let Some(ints) = ints {
        return Property::I64Array(ints);
    }
    Property::F64Array(
        values
            .iter()
            .map(|t| match t {
                Token::Int(v) => *v as f64,
                Token::Float(v) => *v,
                _ => 0.0,
            })
            .collect(),
    )
}

/// Move an `a:` child into the owner's property list, matching the binary
/// layout where arrays are the single property of a leaf.
fn fold_array(node: &mut Node) {
    if !node.properties.is_empty() || !node.has_child("a") {
        return;
    }
    if let Some(slot) = node.children.remove("a") {
        if let Some(array) = slot.iter().next() {
            node.properties = array.properties.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBE: &str = r#"; FBX 7.4.0 project file
FBXHeaderExtension:  {
	FBXHeaderVersion: 1003
	FBXVersion: 7400
}
GlobalSettings:  {
	Version: 1000
	Properties70:  {
		P: "UpAxis", "int", "Integer", "",1
		P: "UnitScaleFactor", "double", "Number", "",2.54
	}
}
Objects:  {
	Geometry: 4001, "Geometry::Cube", "Mesh" {
		Vertices: *12 {
			a: 0,0,0,1,0,0,
1,1,0,0,1,0
		}
		PolygonVertexIndex: *4 {
			a: 0,1,2,-4
		}
	}
	Model: 3000, "Model::Cube", "Mesh" {
		Version: 232
		Properties70:  {
			P: "Lcl Translation", "Lcl Translation", "", "A",0,10.5,0
		}
		Shading: Y
	}
}
Connections:  {
	;Geometry::Cube, Model::Cube
	C: "OO",4001,3000
	C: "OO",3000,0
}
"#;

    #[test]
    fn test_parse_cube() {
        let tree = TextParser::new(CUBE).parse().unwrap();
        assert_eq!(tree.version, 7400);
        assert_eq!(tree.format, SourceFormat::Ascii);

        let geometry = tree.object("Geometry", 4001).unwrap();
        assert_eq!(geometry.attr_name.as_deref(), Some("Cube"));
        assert_eq!(geometry.attr_type.as_deref(), Some("Mesh"));

        let vertices = geometry.child("Vertices").unwrap();
        assert!(vertices.id.is_none());
        assert!(!vertices.has_child("a"));
        assert_eq!(
            vertices.properties,
            vec![Property::I64Array(vec![0, 0, 0, 1, 0, 0, 1, 1, 0, 0, 1, 0])]
        );
        assert_eq!(geometry.array_i64("PolygonVertexIndex"), Some(vec![0, 1, 2, -4]));

        let model = tree.object("Model", 3000).unwrap();
        assert_eq!(model.attr_vec3("Lcl Translation"), Some([0.0, 10.5, 0.0]));
        assert_eq!(model.properties.get(1), Some(&Property::String("Cube".into())));
        assert_eq!(model.value_str("Shading"), Some("Y"));

        let settings = tree.get("GlobalSettings").unwrap();
        assert_eq!(settings.attr_f64("UnitScaleFactor"), Some(2.54));

        assert_eq!(tree.get("Connections").unwrap().children_named("C").count(), 2);
    }

    #[test]
    fn test_float_arrays() {
        let text = "; x\nFBXVersion: 7300\nKeyValueFloat: *3 {\n\ta: 0.5,1,-2.25\n}\n";
        let tree = TextParser::new(text).parse().unwrap();
        let node = tree.get("KeyValueFloat").unwrap();
        assert_eq!(node.properties, vec![Property::F64Array(vec![0.5, 1.0, -2.25])]);
    }

    #[test]
    fn test_embedded_content() {
        let text = "; x\nFBXVersion: 7400\nVideo: 7, \"Video::tex\", \"Clip\" {\n\tContent: , \n\t\"aGVs\",\n\"bG8=\"\n\tRelativeFilename: \"tex.png\"\n}\n";
        let tree = TextParser::new(text).parse().unwrap();
        let video = tree.nodes.by_id("Video", 7).unwrap();
        assert_eq!(video.value_str("Content"), Some("aGVsbG8="));
        assert_eq!(video.value_str("RelativeFilename"), Some("tex.png"));
    }

    #[test]
    fn test_rejects_old_version() {
        let text = "; x\nFBXVersion: 6100\n";
        assert!(matches!(
            TextParser::new(text).parse(),
            Err(FbxError::UnsupportedVersion { version: 6100, minimum: 7000 })
        ));
    }

    #[test]
    fn test_unbalanced_brace() {
        let text = "; x\nFBXVersion: 7400\n}\n";
        match TextParser::new(text).parse() {
            Err(FbxError::MalformedLine { line, .. }) => assert_eq!(line, 3),
            other => panic!("Expected malformed line, got {:?}", other),
        }
    }

    #[test]
    fn test_strip_class_prefix() {
        assert_eq!(strip_class_prefix("Model::Cube"), "Cube");
        assert_eq!(strip_class_prefix("SubDeformer::Cluster Arm"), "Cluster Arm");
        assert_eq!(strip_class_prefix("Plain"), "Plain");
        assert_eq!(strip_class_prefix("::odd"), "::odd");
    }
}
