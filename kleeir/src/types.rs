//! Types module
//!
//! Canonical representation of the types found in textual LLVM IR. Unlike a
//! full compiler type system, types here are plain owned trees: the front-end
//! only needs to answer structural questions ("is this a pointer?", "what is
//! the bit width of this integer?") and print the type back in diagnostics.
use strum::EnumIs;

/// Represents an integer type with a specific bit width.
///
/// Signedness is not represented here; IR integers are sign-agnostic and the
/// consumer decides how to interpret the bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct IType {
    num_bits: u32,
}

impl IType {
    /// Common integer types.
    pub const I1: Self = Self { num_bits: 1 };
    pub const I8: Self = Self { num_bits: 8 };
    pub const I16: Self = Self { num_bits: 16 };
    pub const I32: Self = Self { num_bits: 32 };
    pub const I64: Self = Self { num_bits: 64 };
    pub const I128: Self = Self { num_bits: 128 };
    pub const MIN_BITS: u32 = 1;
    pub const MAX_BITS: u32 = (1 << 23) - 1;

    #[inline]
    const fn check_validity(num_bits: u32) -> bool {
        num_bits >= Self::MIN_BITS && num_bits <= Self::MAX_BITS
    }

    /// Creates a new `IType` with the specified number of bits.
    #[inline]
    pub const fn new(num_bits: u32) -> Option<Self> {
        if Self::check_validity(num_bits) {
            Some(Self { num_bits })
        } else {
            None
        }
    }

    /// Returns the number of bits of the integer type.
    #[inline]
    pub const fn num_bits(&self) -> u32 {
        self.num_bits
    }
}

impl std::fmt::Display for IType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "i{}", self.num_bits)
    }
}

/// Represents a floating-point type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FType {
    /// 16-bit floating point value (IEEE-754 binary16)
    Half,

    /// 16-bit "brain" floating point value (7-bit significand).
    BFloat,

    /// 32-bit floating point value (IEEE-754 binary32)
    Float,

    /// 64-bit floating point value (IEEE-754 binary64)
    Double,

    /// 128-bit floating point value (IEEE-754 binary128)
    Fp128,

    /// 80-bit floating point value (X87 extended precision)
    X86Fp80,

    /// 128-bit floating point value (two 64-bit values)
    PPCFp128,
}

impl FType {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "half" => Some(FType::Half),
            "bfloat" => Some(FType::BFloat),
            "float" => Some(FType::Float),
            "double" => Some(FType::Double),
            "fp128" => Some(FType::Fp128),
            "x86_fp80" => Some(FType::X86Fp80),
            "ppc_fp128" => Some(FType::PPCFp128),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            FType::Half => "half",
            FType::BFloat => "bfloat",
            FType::Float => "float",
            FType::Double => "double",
            FType::Fp128 => "fp128",
            FType::X86Fp80 => "x86_fp80",
            FType::PPCFp128 => "ppc_fp128",
        }
    }
}

impl std::fmt::Display for FType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A sum-type representing any type that can appear in a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum Type {
    /// The `void` type, only valid as a return type.
    Void,

    /// Integer type of arbitrary width (`i1`, `i32`, `i128`, ...).
    Int(IType),

    /// Floating-point type.
    Float(FType),

    /// Opaque pointer (`ptr`, `ptr addrspace(N)`).
    Ptr { addrspace: u32 },

    /// Legacy typed pointer (`i8*`, `%struct.S addrspace(1)*`).
    TypedPtr { pointee: Box<Type>, addrspace: u32 },

    /// Fixed (`<4 x i32>`) or scalable (`<vscale x 4 x i32>`) vector.
    Vector {
        len: u64,
        scalable: bool,
        elem: Box<Type>,
    },

    /// Array type (`[16 x i8]`).
    Array { len: u64, elem: Box<Type> },

    /// Literal structure type (`{ i32, ptr }`) or packed structure (`<{ i8, i32 }>`).
    Struct { fields: Vec<Type>, packed: bool },

    /// Reference to an identified structure type (`%struct.S`).
    Named(String),

    /// Function type (`i32 (ptr, ...)`).
    Function {
        ret: Box<Type>,
        params: Vec<Type>,
        variadic: bool,
    },

    Label,
    Metadata,
    Token,

    /// Target specific types the front-end does not look into (`x86_amx`, `target(...)`).
    Opaque(String),
}

impl Type {
    /// Resolve a single-word type keyword (`i32`, `ptr`, `double`, ...).
    pub fn from_keyword(word: &str) -> Option<Type> {
        match word {
            "void" => Some(Type::Void),
            "ptr" => Some(Type::Ptr { addrspace: 0 }),
            "label" => Some(Type::Label),
            "metadata" => Some(Type::Metadata),
            "token" => Some(Type::Token),
            "x86_amx" | "x86_mmx" => Some(Type::Opaque(word.to_string())),
            _ => FType::from_keyword(word).map(Type::Float).or_else(|| {
                word.strip_prefix('i')
                    .filter(|bits| !bits.is_empty() && bits.bytes().all(|b| b.is_ascii_digit()))
                    .and_then(|bits| bits.parse::<u32>().ok())
                    .and_then(IType::new)
                    .map(Type::Int)
            }),
        }
    }

    /// Returns `true` for opaque and typed pointers, in any address space.
    pub fn is_pointer_like(&self) -> bool {
        matches!(self, Type::Ptr { .. } | Type::TypedPtr { .. })
    }

    /// Bit width of an integer type, `None` for every other shape.
    pub fn integer_width(&self) -> Option<u32> {
        match self {
            Type::Int(ity) => Some(ity.num_bits()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(ity) => write!(f, "{}", ity),
            Type::Float(fty) => write!(f, "{}", fty),
            Type::Ptr { addrspace: 0 } => write!(f, "ptr"),
            Type::Ptr { addrspace } => write!(f, "ptr addrspace({})", addrspace),
            Type::TypedPtr {
                pointee,
                addrspace: 0,
            } => write!(f, "{}*", pointee),
            Type::TypedPtr { pointee, addrspace } => {
                write!(f, "{} addrspace({})*", pointee, addrspace)
            }
            Type::Vector {
                len,
                scalable: false,
                elem,
            } => write!(f, "<{} x {}>", len, elem),
            Type::Vector {
                len,
                scalable: true,
                elem,
            } => write!(f, "<vscale x {} x {}>", len, elem),
            Type::Array { len, elem } => write!(f, "[{} x {}]", len, elem),
            Type::Struct { fields, packed } => {
                if *packed {
                    write!(f, "<")?;
                }
                if fields.is_empty() {
                    write!(f, "{{}}")?;
                } else {
                    write!(
                        f,
                        "{{ {} }}",
                        fields
                            .iter()
                            .map(|x| x.to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )?;
                }
                if *packed {
                    write!(f, ">")?;
                }
                Ok(())
            }
            Type::Named(name) => write!(f, "%{}", name),
            Type::Function {
                ret,
                params,
                variadic,
            } => {
                let mut items = params.iter().map(|x| x.to_string()).collect::<Vec<_>>();
                if *variadic {
                    items.push("...".to_string());
                }
                write!(f, "{} ({})", ret, items.join(", "))
            }
            Type::Label => write!(f, "label"),
            Type::Metadata => write!(f, "metadata"),
            Type::Token => write!(f, "token"),
            Type::Opaque(name) => write!(f, "{}", name),
        }
    }
}
