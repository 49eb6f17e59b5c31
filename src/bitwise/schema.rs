// Layout compiler: turns parsed directives into resolved field paths

use super::accessor::AccessError;
use super::bcd::MAX_BCD_BYTES;
use super::parser::{parse_address, parse_layout, Directive, FieldDecl, Item, StructDecl};
use super::types::{LeafKind, Primitive};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Unknown type `{name}` on line {line}")]
    UnknownType { name: String, line: usize },

    #[error("Seek to {target:#06x} on line {line} is behind the current offset {cursor:#06x}")]
    NonMonotonicSeek {
        target: usize,
        cursor: usize,
        line: usize,
    },

    #[error("Bitfield group on line {line} is {total} bits of `{ty}`; groups must fill one byte")]
    BitfieldWidth { line: usize, total: u64, ty: String },

    #[error("Bitfield `{name}` on line {line} cannot be an array")]
    BitfieldArray { name: String, line: usize },

    #[error("#seekto inside struct `{name}` on line {line}")]
    SeekInStruct { name: String, line: usize },

    #[error("Duplicate field `{name}` on line {line}")]
    DuplicateName { name: String, line: usize },

    #[error("`{name}` on line {line} has zero elements")]
    ZeroCount { name: String, line: usize },

    #[error("Struct `{name}` on line {line} has no fields")]
    ZeroSized { name: String, line: usize },

    #[error("BCD field `{name}` on line {line} is {bytes} bytes wide; at most 9 fit a u64")]
    BcdWidth {
        name: String,
        line: usize,
        bytes: usize,
    },

    #[error("`{name}` on line {line} runs past the end of the address space")]
    Overflow { name: String, line: usize },

    #[error("Unknown field `{0}`")]
    UnknownField(String),

    #[error("Malformed field address `{0}`")]
    BadAddress(String),
}

pub type Result<T> = std::result::Result<T, SchemaError>;

/// One array dimension on the way to a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dim {
    pub count: usize,
    pub stride: usize,
    /// Which dotted segment of the path owns this dimension
    depth: usize,
}

/// A resolved symbolic path such as `memory.freq`.
///
/// Indices supplied to [`FieldPath::at`] run outermost first; an array node
/// may leave off its own index to address the whole array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    name: String,
    base: usize,
    dims: Vec<Dim>,
    own_dim: bool,
    leaf: Option<LeafKind>,
    size: usize,
}

/// Concrete byte range produced by indexing a [`FieldPath`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub offset: usize,
    pub len: usize,
    /// `None` for composite nodes, which only support raw access
    pub leaf: Option<LeafKind>,
}

impl FieldPath {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    pub fn leaf(&self) -> Option<LeafKind> {
        self.leaf
    }

    /// Element count of an array node
    pub fn count(&self) -> Option<usize> {
        if self.own_dim {
            self.dims.last().map(|d| d.count)
        } else {
            None
        }
    }

    /// Bytes covered by one fully indexed instance
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn at(&self, indices: &[usize]) -> std::result::Result<Location, AccessError> {
        let full = self.dims.len();
        let partial = full - usize::from(self.own_dim);

        if indices.len() != full && indices.len() != partial {
            return Err(AccessError::IndexCount {
                path: self.name.clone(),
                expected: full,
                actual: indices.len(),
            });
        }

        let mut offset = self.base;
        for (dim, &index) in self.dims.iter().zip(indices) {
            if index >= dim.count {
                return Err(AccessError::IndexOutOfRange {
                    path: self.name.clone(),
                    index,
                    count: dim.count,
                });
            }
            offset += index * dim.stride;
        }

        if indices.len() == full {
            return Ok(Location {
                path: self.name.clone(),
                offset,
                len: self.size,
                leaf: self.leaf,
            });
        }

        // Whole-array view of the last dimension
        let own = self.dims[full - 1];
        Ok(Location {
            path: self.name.clone(),
            offset,
            len: own.count * own.stride,
            leaf: None,
        })
    }
}

/// Compiled layout: every declared node, in declaration order
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldPath>,
    index: HashMap<String, usize>,
    extent: usize,
}

impl Schema {
    pub fn compile(src: &str) -> Result<Self> {
        let directives = parse_layout(src)?;

        let mut compiler = Compiler {
            fields: Vec::new(),
            index: HashMap::new(),
            extent: 0,
        };
        compiler.block(&directives, "", &[], 0, None)?;

        debug!(
            "Compiled layout: {} fields, extent {:#06x}",
            compiler.fields.len(),
            compiler.extent
        );

        Ok(Schema {
            fields: compiler.fields,
            index: compiler.index,
            extent: compiler.extent,
        })
    }

    /// One past the last byte any field touches
    pub fn extent(&self) -> usize {
        self.extent
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldPath> {
        self.fields.iter()
    }

    /// Resolve a dotted symbolic path (`memory.freq`)
    pub fn path(&self, name: &str) -> Result<FieldPath> {
        self.index
            .get(name)
            .map(|&i| self.fields[i].clone())
            .ok_or_else(|| SchemaError::UnknownField(name.to_string()))
    }

    /// Resolve a concrete address such as `memory[12].tone`
    pub fn locate(&self, address: &str) -> std::result::Result<Location, AccessError> {
        let segments =
            parse_address(address).ok_or_else(|| SchemaError::BadAddress(address.to_string()))?;

        let name = segments
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(".");
        let path = self.path(&name)?;

        // Every subscript must belong to an array dimension
        for (depth, segment) in segments.iter().enumerate() {
            if segment.index.is_some() && !path.dims.iter().any(|d| d.depth == depth) {
                return Err(AccessError::NotAnArray {
                    path: address.to_string(),
                });
            }
        }

        let mut indices = Vec::with_capacity(path.dims.len());
        for (i, dim) in path.dims.iter().enumerate() {
            match segments[dim.depth].index {
                Some(index) => indices.push(index as usize),
                None if path.own_dim && i + 1 == path.dims.len() => break,
                None => {
                    return Err(AccessError::IndexCount {
                        path: address.to_string(),
                        expected: path.dims.len(),
                        actual: indices.len(),
                    })
                }
            }
        }

        path.at(&indices)
    }
}

struct Compiler {
    fields: Vec<FieldPath>,
    index: HashMap<String, usize>,
    extent: usize,
}

impl Compiler {
    fn register(&mut self, field: FieldPath, line: usize) -> Result<()> {
        if self.index.contains_key(&field.name) {
            return Err(SchemaError::DuplicateName {
                name: field.name,
                line,
            });
        }
        let len = match field.dims.first() {
            Some(dim) => dim.count.checked_mul(dim.stride),
            None => Some(field.size),
        };
        let end = len
            .and_then(|len| field.base.checked_add(len))
            .ok_or_else(|| SchemaError::Overflow {
                name: field.name.clone(),
                line,
            })?;
        self.extent = self.extent.max(end);
        self.index.insert(field.name.clone(), self.fields.len());
        self.fields.push(field);
        Ok(())
    }

    /// Compile a directive list starting at `cursor`; returns the end cursor
    fn block(
        &mut self,
        directives: &[Directive],
        prefix: &str,
        dims: &[Dim],
        mut cursor: usize,
        in_struct: Option<&str>,
    ) -> Result<usize> {
        let depth = if prefix.is_empty() {
            0
        } else {
            prefix.matches('.').count() + 1
        };

        for directive in directives {
            match directive {
                Directive::SeekTo { target, line } => {
                    if let Some(name) = in_struct {
                        return Err(SchemaError::SeekInStruct {
                            name: name.to_string(),
                            line: *line,
                        });
                    }
                    let target = usize::try_from(*target).map_err(|_| SchemaError::Overflow {
                        name: format!("#seekto {:#x}", target),
                        line: *line,
                    })?;
                    if target < cursor {
                        return Err(SchemaError::NonMonotonicSeek {
                            target,
                            cursor,
                            line: *line,
                        });
                    }
                    cursor = target;
                }
                Directive::Field(decl) => {
                    cursor = self.field(decl, prefix, dims, depth, cursor)?;
                }
                Directive::Struct(decl) => {
                    cursor = self.structure(decl, prefix, dims, depth, cursor)?;
                }
            }
        }

        Ok(cursor)
    }

    fn field(
        &mut self,
        decl: &FieldDecl,
        prefix: &str,
        dims: &[Dim],
        depth: usize,
        mut cursor: usize,
    ) -> Result<usize> {
        let prim = Primitive::from_keyword(&decl.ty).ok_or_else(|| SchemaError::UnknownType {
            name: decl.ty.clone(),
            line: decl.line,
        })?;

        let bitfields = decl.items.iter().filter(|i| i.bits.is_some()).count();
        if bitfields > 0 {
            if bitfields != decl.items.len() {
                return Err(SchemaError::Syntax {
                    line: decl.line,
                    message: "bitfield group mixes plain fields".to_string(),
                });
            }
            return self.bitfield_group(decl, prim, prefix, dims, cursor);
        }

        for item in &decl.items {
            let name = join(prefix, &item.name);
            let count = nonzero(item, decl.line)?;

            let (leaf, bytes, array) = match prim {
                Primitive::Bcd { endian } => {
                    // `[n]` on a BCD field is its byte width
                    let bytes = count.unwrap_or(1);
                    if bytes > MAX_BCD_BYTES {
                        return Err(SchemaError::BcdWidth {
                            name,
                            line: decl.line,
                            bytes,
                        });
                    }
                    (LeafKind::Bcd { bytes, endian }, bytes, None)
                }
                Primitive::Unsigned { bytes, endian } => {
                    (LeafKind::Unsigned { bytes, endian }, bytes, count)
                }
                Primitive::Signed { bytes, endian } => {
                    (LeafKind::Signed { bytes, endian }, bytes, count)
                }
            };

            let mut field_dims = dims.to_vec();
            if let Some(count) = array {
                field_dims.push(Dim {
                    count,
                    stride: bytes,
                    depth,
                });
            }

            let field = FieldPath {
                name,
                base: cursor,
                dims: field_dims,
                own_dim: array.is_some(),
                leaf: Some(leaf),
                size: bytes,
            };
            let span = extend(cursor, bytes, array.unwrap_or(1), &field.name, decl.line)?;
            self.register(field, decl.line)?;
            cursor = span;
        }

        Ok(cursor)
    }

    fn bitfield_group(
        &mut self,
        decl: &FieldDecl,
        prim: Primitive,
        prefix: &str,
        dims: &[Dim],
        cursor: usize,
    ) -> Result<usize> {
        let total = decl
            .items
            .iter()
            .filter_map(|i| i.bits)
            .fold(0u64, u64::saturating_add);
        let byte_storage = matches!(prim, Primitive::Unsigned { bytes: 1, .. });
        let zero_width = decl.items.iter().any(|i| i.bits == Some(0));

        if !byte_storage || total != 8 || zero_width {
            return Err(SchemaError::BitfieldWidth {
                line: decl.line,
                total,
                ty: decl.ty.clone(),
            });
        }

        // Most significant bits are declared first
        let mut remaining: u8 = 8;
        for item in &decl.items {
            if item.count.is_some() {
                return Err(SchemaError::BitfieldArray {
                    name: item.name.clone(),
                    line: decl.line,
                });
            }
            // Every width is at most 8 once the group totals 8
            let width = item.bits.and_then(|b| u8::try_from(b).ok()).unwrap_or(0);
            remaining = remaining.saturating_sub(width);

            self.register(
                FieldPath {
                    name: join(prefix, &item.name),
                    base: cursor,
                    dims: dims.to_vec(),
                    own_dim: false,
                    leaf: Some(LeafKind::Bits {
                        shift: remaining,
                        width,
                    }),
                    size: 1,
                },
                decl.line,
            )?;
        }

        extend(cursor, 1, 1, &decl.ty, decl.line)
    }

    fn structure(
        &mut self,
        decl: &StructDecl,
        prefix: &str,
        dims: &[Dim],
        depth: usize,
        cursor: usize,
    ) -> Result<usize> {
        let name = join(prefix, &decl.name);
        let count = match decl.count {
            Some(0) => {
                return Err(SchemaError::ZeroCount {
                    name,
                    line: decl.line,
                })
            }
            Some(c) => Some(usize::try_from(c).map_err(|_| SchemaError::Overflow {
                name: name.clone(),
                line: decl.line,
            })?),
            None => None,
        };

        let mut member_dims = dims.to_vec();
        if let Some(count) = count {
            // Stride is patched once the body has been measured
            member_dims.push(Dim {
                count,
                stride: 0,
                depth,
            });
        }

        // Reserve the struct's own slot so members follow it
        let slot = self.fields.len();
        self.register(
            FieldPath {
                name: name.clone(),
                base: cursor,
                dims: member_dims.clone(),
                own_dim: count.is_some(),
                leaf: None,
                size: 0,
            },
            decl.line,
        )?;

        let end = self.block(&decl.members, &name, &member_dims, cursor, Some(&decl.name))?;
        let size = end - cursor;
        if size == 0 {
            return Err(SchemaError::ZeroSized {
                name,
                line: decl.line,
            });
        }

        if count.is_some() {
            let level = member_dims.len() - 1;
            for field in &mut self.fields[slot..] {
                field.dims[level].stride = size;
            }
        }
        self.fields[slot].size = size;

        let end = extend(cursor, size, count.unwrap_or(1), &name, decl.line)?;
        self.extent = self.extent.max(end);
        Ok(end)
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn nonzero(item: &Item, line: usize) -> Result<Option<usize>> {
    match item.count {
        Some(0) => Err(SchemaError::ZeroCount {
            name: item.name.clone(),
            line,
        }),
        Some(c) => usize::try_from(c).map(Some).map_err(|_| SchemaError::Overflow {
            name: item.name.clone(),
            line,
        }),
        None => Ok(None),
    }
}

/// Cursor after `count` elements of `size` bytes starting at `cursor`
fn extend(cursor: usize, size: usize, count: usize, name: &str, line: usize) -> Result<usize> {
    size.checked_mul(count)
        .and_then(|span| cursor.checked_add(span))
        .ok_or_else(|| SchemaError::Overflow {
            name: name.to_string(),
            line,
        })
}
