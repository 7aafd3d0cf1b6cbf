//! In-memory FBX writers for the integration tests.
//!
//! A document is described once as a list of [`Record`]s and can then be
//! rendered as ASCII text or as a binary buffer, so both front ends see the
//! same content.

#![allow(dead_code)]

use std::fmt::Write as _;

use kaydara_parser::BINARY_MAGIC;

/// FBX time units per second.
pub const TICKS_PER_SECOND: i64 = 46_186_158_000;

/// One property of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    /// Object name, written `Class::name` in text and `name\0\x01Class` in binary.
    Name(&'static str, String),
    Ints(Vec<i32>),
    Longs(Vec<i64>),
    Floats(Vec<f64>),
}

/// A node record with its properties and nested records.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub values: Vec<Value>,
    pub children: Vec<Record>,
}

impl Record {
    pub fn new(name: &str, values: Vec<Value>) -> Self {
        Self {
            name: name.to_string(),
            values,
            children: Vec::new(),
        }
    }

    pub fn with(mut self, child: Record) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_all(mut self, children: impl IntoIterator<Item = Record>) -> Self {
        self.children.extend(children);
        self
    }
}

pub fn s(value: &str) -> Value {
    Value::Str(value.to_string())
}

/// `Kind: id, "Class::name", "type" { }`
pub fn object(kind: &str, id: i64, class: &'static str, name: &str, type_name: &str) -> Record {
    Record::new(
        kind,
        vec![Value::Int(id), Value::Name(class, name.to_string()), s(type_name)],
    )
}

/// A `Properties70` block.
pub fn props(entries: Vec<Record>) -> Record {
    Record::new("Properties70", Vec::new()).with_all(entries)
}

/// `P: name, type, type2, flag, values...`
pub fn p(name: &str, type_name: &str, values: &[f64]) -> Record {
    let mut all = vec![s(name), s(type_name), s(""), s("")];
    all.extend(values.iter().map(|&v| Value::Float(v)));
    Record::new("P", all)
}

pub fn p_str(name: &str, type_name: &str, value: &str) -> Record {
    Record::new("P", vec![s(name), s(type_name), s(""), s(""), s(value)])
}

pub fn floats(name: &str, values: &[f64]) -> Record {
    Record::new(name, vec![Value::Floats(values.to_vec())])
}

pub fn ints(name: &str, values: &[i32]) -> Record {
    Record::new(name, vec![Value::Ints(values.to_vec())])
}

pub fn longs(name: &str, values: &[i64]) -> Record {
    Record::new(name, vec![Value::Longs(values.to_vec())])
}

pub fn leaf(name: &str, value: Value) -> Record {
    Record::new(name, vec![value])
}

pub fn connect(child: i64, parent: i64) -> Record {
    Record::new("C", vec![s("OO"), Value::Int(child), Value::Int(parent)])
}

pub fn connect_property(child: i64, parent: i64, relationship: &str) -> Record {
    Record::new(
        "C",
        vec![s("OP"), Value::Int(child), Value::Int(parent), s(relationship)],
    )
}

/// A complete document: header, objects and connections.
#[derive(Debug, Clone)]
pub struct Document {
    pub version: u32,
    pub records: Vec<Record>,
}

impl Document {
    pub fn new(version: u32, objects: Vec<Record>, connections: Vec<Record>) -> Self {
        let header = Record::new("FBXHeaderExtension", Vec::new())
            .with(leaf("FBXVersion", Value::Int(i64::from(version))));
        Self {
            version,
            records: vec![
                header,
                Record::new("Objects", Vec::new()).with_all(objects),
                Record::new("Connections", Vec::new()).with_all(connections),
            ],
        }
    }

    /// Insert a top-level record before `Objects`.
    pub fn with_section(mut self, record: Record) -> Self {
        self.records.insert(1, record);
        self
    }

    pub fn to_ascii(&self) -> String {
        let major = self.version / 1000;
        let minor = (self.version % 1000) / 100;
        let mut out = format!("; FBX {}.{}.0 project file\n", major, minor);
        for record in &self.records {
            write_ascii(&mut out, record, 0);
        }
        out
    }

    pub fn to_binary(&self, compress: bool) -> Vec<u8> {
        let mut writer = BinaryWriter::new(self.version, compress);
        for record in &self.records {
            writer.record(record);
        }
        writer.finish()
    }
}

fn ascii_value(value: &Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::Float(v) => format!("{:?}", v),
        Value::Str(v) => format!("\"{}\"", v),
        Value::Name(class, name) => format!("\"{}::{}\"", class, name),
        Value::Ints(_) | Value::Longs(_) | Value::Floats(_) => String::new(),
    }
}

fn ascii_array(value: &Value) -> Option<(usize, String)> {
    let join = |items: Vec<String>| items.join(",");
    match value {
        Value::Ints(v) => Some((v.len(), join(v.iter().map(i32::to_string).collect()))),
        Value::Longs(v) => Some((v.len(), join(v.iter().map(i64::to_string).collect()))),
        Value::Floats(v) => Some((v.len(), join(v.iter().map(|x| format!("{:?}", x)).collect()))),
        _ => None,
    }
}

fn write_ascii(out: &mut String, record: &Record, depth: usize) {
    let indent = "\t".repeat(depth);

    if let Some((len, body)) = record.values.first().and_then(ascii_array) {
        let _ = writeln!(out, "{}{}: *{} {{", indent, record.name, len);
        let _ = writeln!(out, "{}\ta: {}", indent, body);
        let _ = writeln!(out, "{}}}", indent);
        return;
    }

    // Objects always open a block so the text front end reads their id.
    let is_object = record.values.len() > 1 && matches!(record.values.first(), Some(Value::Int(_)));

    let values: Vec<String> = record.values.iter().map(ascii_value).collect();
    let _ = write!(out, "{}{}: {}", indent, record.name, values.join(", "));
    if record.children.is_empty() && !record.values.is_empty() && !is_object {
        out.push('\n');
        return;
    }

    out.push_str(" {\n");
    for child in &record.children {
        write_ascii(out, child, depth + 1);
    }
    let _ = writeln!(out, "{}}}", indent);
}

/// Binary record writer. Headers are 64-bit from version 7500.
struct BinaryWriter {
    buf: Vec<u8>,
    wide: bool,
    compress: bool,
}

impl BinaryWriter {
    fn new(version: u32, compress: bool) -> Self {
        let mut buf = BINARY_MAGIC.to_vec();
        buf.extend_from_slice(&[0x1a, 0x00]);
        buf.extend_from_slice(&version.to_le_bytes());
        Self {
            buf,
            wide: version >= 7500,
            compress,
        }
    }

    fn field_len(&self) -> usize {
        if self.wide {
            8
        } else {
            4
        }
    }

    fn null_record(&mut self) {
        let len = self.field_len() * 3 + 1;
        self.buf.extend(std::iter::repeat(0u8).take(len));
    }

    fn patch_field(&mut self, at: usize, value: u64) {
        if self.wide {
            self.buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
        } else {
            self.buf[at..at + 4].copy_from_slice(&(value as u32).to_le_bytes());
        }
    }

    fn record(&mut self, record: &Record) {
        let field = self.field_len();
        let start = self.buf.len();
        self.buf.extend(std::iter::repeat(0u8).take(field * 3));
        self.buf.push(record.name.len() as u8);
        self.buf.extend_from_slice(record.name.as_bytes());

        let props_start = self.buf.len();
        for value in &record.values {
            self.value(value);
        }
        let props_len = (self.buf.len() - props_start) as u64;

        if !record.children.is_empty() {
            for child in &record.children {
                self.record(child);
            }
            self.null_record();
        } else if record.values.is_empty() {
            self.null_record();
        }

        let end = self.buf.len() as u64;
        self.patch_field(start, end);
        self.patch_field(start + field, record.values.len() as u64);
        self.patch_field(start + 2 * field, props_len);
    }

    fn value(&mut self, value: &Value) {
        match value {
            Value::Int(v) => {
                self.buf.push(b'L');
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Float(v) => {
                self.buf.push(b'D');
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Str(v) => self.string(v.as_bytes()),
            Value::Name(class, name) => {
                let mut bytes = name.as_bytes().to_vec();
                bytes.extend_from_slice(b"\0\x01");
                bytes.extend_from_slice(class.as_bytes());
                self.string(&bytes);
            }
            Value::Ints(v) => {
                let raw: Vec<u8> = v.iter().flat_map(|x| x.to_le_bytes()).collect();
                self.array(b'i', v.len(), raw);
            }
            Value::Longs(v) => {
                let raw: Vec<u8> = v.iter().flat_map(|x| x.to_le_bytes()).collect();
                self.array(b'l', v.len(), raw);
            }
            Value::Floats(v) => {
                let raw: Vec<u8> = v.iter().flat_map(|x| x.to_le_bytes()).collect();
                self.array(b'd', v.len(), raw);
            }
        }
    }

    fn string(&mut self, bytes: &[u8]) {
        self.buf.push(b'S');
        self.buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(bytes);
    }

    fn array(&mut self, tag: u8, count: usize, raw: Vec<u8>) {
        let payload = if self.compress {
            miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6)
        } else {
            raw
        };
        self.buf.push(tag);
        self.buf.extend_from_slice(&(count as u32).to_le_bytes());
        self.buf.extend_from_slice(&u32::from(self.compress).to_le_bytes());
        self.buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(&payload);
    }

    fn finish(mut self) -> Vec<u8> {
        self.null_record();
        self.buf.extend(std::iter::repeat(0u8).take(200));
        self.buf
    }
}

/// Mesh geometry record with optional extra layers.
pub fn mesh_geometry(id: i64, name: &str, vertices: &[f64], polygons: &[i32]) -> Record {
    object("Geometry", id, "Geometry", name, "Mesh")
        .with(floats("Vertices", vertices))
        .with(ints("PolygonVertexIndex", polygons))
}

/// Unit quad in the XY plane, one polygon.
pub fn quad_geometry(id: i64) -> Record {
    mesh_geometry(
        id,
        "Quad",
        &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
        &[0, 1, 2, -4],
    )
}

/// Key times in ticks for times in seconds.
pub fn ticks(seconds: &[i64]) -> Vec<i64> {
    seconds.iter().map(|s| s * TICKS_PER_SECOND).collect()
}

/// `AnimationCurve` with keys at whole seconds.
pub fn curve(id: i64, seconds: &[i64], values: &[f64]) -> Record {
    object("AnimationCurve", id, "AnimCurve", "", "")
        .with(longs("KeyTime", &ticks(seconds)))
        .with(floats("KeyValueFloat", values))
}
