//! Conversion between wire text and typed field values.
//!
//! # Responsibilities
//! - Parse wire text into strings, booleans, integers, floats and complex numbers
//! - Render typed values back into wire text
//! - Treat `Vec<T>` as comma-joined lists and `Option<T>`/`Box<T>` as optional slots
//!
//! # Design Decisions
//! - Empty text is the zero value, never an error
//! - Floats render in shortest round-trip form without an exponent
//! - Absent optional values render as no text at all

use std::fmt;

/// Closed set of kinds the converter understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarKind {
    Text,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Isize,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Usize,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Slice(Box<ScalarKind>),
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Text => "string",
            ScalarKind::Bool => "bool",
            ScalarKind::Int8 => "i8",
            ScalarKind::Int16 => "i16",
            ScalarKind::Int32 => "i32",
            ScalarKind::Int64 => "i64",
            ScalarKind::Isize => "isize",
            ScalarKind::Uint8 => "u8",
            ScalarKind::Uint16 => "u16",
            ScalarKind::Uint32 => "u32",
            ScalarKind::Uint64 => "u64",
            ScalarKind::Usize => "usize",
            ScalarKind::Float32 => "f32",
            ScalarKind::Float64 => "f64",
            ScalarKind::Complex64 => "complex64",
            ScalarKind::Complex128 => "complex128",
            ScalarKind::Slice(inner) => return write!(f, "list of {}", inner),
        };
        f.write_str(name)
    }
}

/// Failure to parse one piece of wire text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    pub kind: ScalarKind,
    pub text: String,
    pub reason: String,
}

impl ConversionError {
    fn new(kind: ScalarKind, text: &str, reason: impl fmt::Display) -> Self {
        Self {
            kind,
            text: text.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A value that can live in a textual HTTP location.
pub trait Scalar: Sized + Send + Sync + 'static {
    /// Kind reported in conversion errors.
    fn kind() -> ScalarKind;

    /// Parse non-empty wire text.
    fn parse_wire(text: &str) -> Result<Self, ConversionError>;

    /// Render without any encoding. `None` means the value is absent.
    fn to_wire(&self) -> Option<String>;

    /// Zero value produced for empty wire text.
    fn zero() -> Self;

    /// Parse wire text, mapping empty text to [`Scalar::zero`].
    fn from_wire(text: &str) -> Result<Self, ConversionError> {
        if text.is_empty() {
            return Ok(Self::zero());
        }
        Self::parse_wire(text)
    }

    /// Render, percent-encoding the text when `url_encode` is set.
    fn render(&self, url_encode: bool) -> Option<String> {
        let text = self.to_wire()?;
        if url_encode {
            Some(urlencoding::encode(&text).into_owned())
        } else {
            Some(text)
        }
    }
}

impl Scalar for String {
    fn kind() -> ScalarKind {
        ScalarKind::Text
    }

    fn parse_wire(text: &str) -> Result<Self, ConversionError> {
        Ok(text.to_string())
    }

    fn to_wire(&self) -> Option<String> {
        Some(self.clone())
    }

    fn zero() -> Self {
        String::new()
    }
}

impl Scalar for bool {
    fn kind() -> ScalarKind {
        ScalarKind::Bool
    }

    fn parse_wire(text: &str) -> Result<Self, ConversionError> {
        match text {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            _ => Err(ConversionError::new(ScalarKind::Bool, text, "invalid syntax")),
        }
    }

    fn to_wire(&self) -> Option<String> {
        Some(self.to_string())
    }

    fn zero() -> Self {
        false
    }
}

macro_rules! number_scalar {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Scalar for $ty {
                fn kind() -> ScalarKind {
                    ScalarKind::$kind
                }

                fn parse_wire(text: &str) -> Result<Self, ConversionError> {
                    text.parse::<$ty>()
                        .map_err(|e| ConversionError::new(ScalarKind::$kind, text, e))
                }

                fn to_wire(&self) -> Option<String> {
                    Some(self.to_string())
                }

                fn zero() -> Self {
                    <$ty>::default()
                }
            }
        )*
    };
}

number_scalar! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    isize => Isize,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    usize => Usize,
    f32 => Float32,
    f64 => Float64,
}

/// Complex number with a real and an imaginary part.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

pub type Complex64 = Complex<f32>;
pub type Complex128 = Complex<f64>;

impl<T> Complex<T> {
    pub fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

impl<T: fmt::Display + PartialOrd + Default> fmt::Display for Complex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.im < T::default() { "" } else { "+" };
        write!(f, "({}{}{}i)", self.re, sign, self.im)
    }
}

/// Split `a+bi` style text into real and imaginary text.
fn split_complex(text: &str) -> Option<(&str, &str)> {
    let body = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text);

    let Some(imaginary) = body.strip_suffix('i') else {
        return Some((body, "0"));
    };

    // Sign separating the parts: not leading, not part of an exponent.
    let bytes = imaginary.as_bytes();
    let split = (1..bytes.len())
        .rev()
        .find(|&i| matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E'));

    match split {
        Some(i) => Some((&imaginary[..i], &imaginary[i..])),
        None => Some(("0", imaginary)),
    }
}

macro_rules! complex_scalar {
    ($($part:ty => $kind:ident),* $(,)?) => {
        $(
            impl Scalar for Complex<$part> {
                fn kind() -> ScalarKind {
                    ScalarKind::$kind
                }

                fn parse_wire(text: &str) -> Result<Self, ConversionError> {
                    let invalid = |reason: &str| ConversionError::new(ScalarKind::$kind, text, reason);
                    let (re, im) = split_complex(text.trim()).ok_or_else(|| invalid("invalid syntax"))?;
                    let im = match im {
                        "" | "+" => "1",
                        "-" => "-1",
                        other => other,
                    };
                    let re = re.parse::<$part>().map_err(|_| invalid("invalid real part"))?;
                    let im = im.parse::<$part>().map_err(|_| invalid("invalid imaginary part"))?;
                    Ok(Complex::new(re, im))
                }

                fn to_wire(&self) -> Option<String> {
                    Some(self.to_string())
                }

                fn zero() -> Self {
                    Complex::default()
                }
            }
        )*
    };
}

complex_scalar! {
    f32 => Complex64,
    f64 => Complex128,
}

impl<T: Scalar> Scalar for Option<T> {
    fn kind() -> ScalarKind {
        T::kind()
    }

    // Allocates down to the leaf, so empty text yields `Some(zero)`.
    fn parse_wire(text: &str) -> Result<Self, ConversionError> {
        T::from_wire(text).map(Some)
    }

    fn to_wire(&self) -> Option<String> {
        self.as_ref().and_then(T::to_wire)
    }

    fn zero() -> Self {
        Some(T::zero())
    }

    fn render(&self, url_encode: bool) -> Option<String> {
        self.as_ref().and_then(|v| v.render(url_encode))
    }
}

impl<T: Scalar> Scalar for Box<T> {
    fn kind() -> ScalarKind {
        T::kind()
    }

    fn parse_wire(text: &str) -> Result<Self, ConversionError> {
        T::from_wire(text).map(Box::new)
    }

    fn to_wire(&self) -> Option<String> {
        self.as_ref().to_wire()
    }

    fn zero() -> Self {
        Box::new(T::zero())
    }

    fn render(&self, url_encode: bool) -> Option<String> {
        self.as_ref().render(url_encode)
    }
}

impl<T: Scalar> Scalar for Vec<T> {
    fn kind() -> ScalarKind {
        ScalarKind::Slice(Box::new(T::kind()))
    }

    fn parse_wire(text: &str) -> Result<Self, ConversionError> {
        text.split(',')
            .map(str::trim)
            .filter(|element| !element.is_empty())
            .map(|element| {
                T::from_wire(element).map_err(|e| {
                    ConversionError::new(
                        Self::kind(),
                        text,
                        format!("value '{}' error: {}", element, e.reason),
                    )
                })
            })
            .collect()
    }

    fn to_wire(&self) -> Option<String> {
        self.render(false)
    }

    fn zero() -> Self {
        Vec::new()
    }

    // Elements are encoded one by one so the separators stay literal.
    fn render(&self, url_encode: bool) -> Option<String> {
        let parts: Vec<String> = self.iter().filter_map(|v| v.render(url_encode)).collect();
        Some(parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_zero() {
        assert_eq!(i32::from_wire("").unwrap(), 0);
        assert_eq!(String::from_wire("").unwrap(), "");
        assert!(!bool::from_wire("").unwrap());
        assert_eq!(Vec::<u8>::from_wire("").unwrap(), Vec::<u8>::new());
        assert_eq!(Option::<Option<i32>>::from_wire("").unwrap(), Some(Some(0)));
    }

    #[test]
    fn test_integer_widths() {
        assert_eq!(i8::from_wire("-128").unwrap(), -128);
        assert!(i8::from_wire("128").is_err());
        assert_eq!(u8::from_wire("255").unwrap(), 255);
        assert!(u16::from_wire("-1").is_err());
        assert_eq!(i64::from_wire("+42").unwrap(), 42);

        let err = u32::from_wire("abc").unwrap_err();
        assert_eq!(err.kind, ScalarKind::Uint32);
        assert_eq!(err.text, "abc");
    }

    #[test]
    fn test_bool_spellings() {
        for t in ["1", "t", "T", "TRUE", "true", "True"] {
            assert!(bool::from_wire(t).unwrap(), "{t}");
        }
        for f in ["0", "f", "F", "FALSE", "false", "False"] {
            assert!(!bool::from_wire(f).unwrap(), "{f}");
        }
        assert!(bool::from_wire("yes").is_err());
    }

    #[test]
    fn test_float_rendering() {
        assert_eq!(1.5f64.to_wire().unwrap(), "1.5");
        assert_eq!(0.1f32.to_wire().unwrap(), "0.1");
        assert_eq!(1e21f64.to_wire().unwrap(), "1000000000000000000000");
        assert_eq!(f64::from_wire("2.25").unwrap(), 2.25);
    }

    #[test]
    fn test_complex_forms() {
        assert_eq!(Complex64::from_wire("13+4i").unwrap(), Complex::new(13.0, 4.0));
        assert_eq!(Complex128::from_wire("(1-3i)").unwrap(), Complex::new(1.0, -3.0));
        assert_eq!(Complex128::from_wire("3").unwrap(), Complex::new(3.0, 0.0));
        assert_eq!(Complex128::from_wire("2i").unwrap(), Complex::new(0.0, 2.0));
        assert_eq!(Complex128::from_wire("1e3+1e-2i").unwrap(), Complex::new(1000.0, 0.01));
        assert!(Complex128::from_wire("1+xi").is_err());

        assert_eq!(Complex::new(1.0f64, 2.0).to_wire().unwrap(), "(1+2i)");
        assert_eq!(Complex::new(1.5f64, -2.0).to_wire().unwrap(), "(1.5-2i)");
    }

    #[test]
    fn test_slices() {
        assert_eq!(Vec::<i32>::from_wire("1, 2, 3").unwrap(), vec![1, 2, 3]);
        assert_eq!(Vec::<i32>::from_wire("1,,3, ").unwrap(), vec![1, 3]);

        let err = Vec::<i32>::from_wire("1,x,3").unwrap_err();
        assert_eq!(err.kind, ScalarKind::Slice(Box::new(ScalarKind::Int32)));

        assert_eq!(vec![1u8, 2, 3].to_wire().unwrap(), "1,2,3");
        assert_eq!(Vec::<Option<i32>>::from_wire("4, 5").unwrap(), vec![Some(4), Some(5)]);
        assert_eq!(vec![Some(1), None, Some(3)].to_wire().unwrap(), "1,3");
    }

    #[test]
    fn test_optional_rendering() {
        let absent: Option<Option<i32>> = None;
        assert_eq!(absent.to_wire(), None);
        let inner_absent: Option<Option<i32>> = Some(None);
        assert_eq!(inner_absent.to_wire(), None);
        assert_eq!(Some(Some(7)).to_wire().unwrap(), "7");
    }

    #[test]
    fn test_url_encoding() {
        let value = String::from("a b&c");
        assert_eq!(value.render(true).unwrap(), "a%20b%26c");
        assert_eq!(value.render(false).unwrap(), "a b&c");

        let list = vec![String::from("x y"), String::from("z")];
        assert_eq!(list.render(true).unwrap(), "x%20y,z");
    }
}
