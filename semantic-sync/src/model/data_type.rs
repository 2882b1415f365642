//! Normalized column types and the per-dialect native type tables
//!
//! Each dialect table is a bijection onto the closed `DataType` set, so
//! `to_native(from_native(t)) == t` holds for every accepted spelling.
//! Unknown or parameterised native types are rejected, never coerced.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Normalized data types shared by every platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    String,
    Int64,
    Double,
    Boolean,
    DateTime,
    Decimal,
}

impl DataType {
    pub const ALL: [DataType; 6] = [
        DataType::String,
        DataType::Int64,
        DataType::Double,
        DataType::Boolean,
        DataType::DateTime,
        DataType::Decimal,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Int64 => "Int64",
            Self::Double => "Double",
            Self::Boolean => "Boolean",
            Self::DateTime => "DateTime",
            Self::Decimal => "Decimal",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Platform whose native type names a raw extract uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Snowflake,
    Fabric,
}

impl Dialect {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Snowflake => "snowflake",
            Self::Fabric => "fabric",
        }
    }

    fn table(&self) -> &'static [(&'static str, DataType)] {
        match self {
            Self::Snowflake => SNOWFLAKE_TYPES,
            Self::Fabric => FABRIC_TYPES,
        }
    }

    /// Map a native type name onto the normalized set
    ///
    /// Only the exact spellings of the dialect table are accepted, so that
    /// `to_native(from_native(t)) == t`. A length or precision suffix such as
    /// `VARCHAR(255)` has no place in the normalized type and is rejected
    /// rather than dropped.
    pub fn from_native(&self, native: &str) -> Result<DataType, UnknownNativeType> {
        let unknown = |parameterised| UnknownNativeType {
            dialect: *self,
            native: native.to_string(),
            parameterised,
        };

        let caps = NATIVE_TYPE_RE.captures(native).ok_or_else(|| unknown(false))?;
        if caps.get(2).is_some() {
            return Err(unknown(true));
        }

        self.table()
            .iter()
            .find(|(name, _)| *name == native)
            .map(|(_, data_type)| *data_type)
            .ok_or_else(|| unknown(false))
    }

    /// Canonical native spelling for a normalized type
    pub fn to_native(&self, data_type: DataType) -> &'static str {
        self.table()
            .iter()
            .find(|(_, t)| *t == data_type)
            .map(|(name, _)| *name)
            // Both tables cover every DataType; see the exhaustiveness test
            .unwrap_or(data_type.label())
    }

    /// Every native spelling this dialect accepts
    pub fn native_names(&self) -> impl Iterator<Item = &'static str> {
        self.table().iter().map(|(name, _)| *name)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snowflake" => Ok(Self::Snowflake),
            "fabric" | "powerbi" | "power-bi" => Ok(Self::Fabric),
            other => Err(format!("unknown dialect '{}'", other)),
        }
    }
}

/// Snowflake native types, one spelling per normalized type
pub const SNOWFLAKE_TYPES: &[(&str, DataType)] = &[
    ("VARCHAR", DataType::String),
    ("INTEGER", DataType::Int64),
    ("FLOAT", DataType::Double),
    ("BOOLEAN", DataType::Boolean),
    ("TIMESTAMP", DataType::DateTime),
    ("DECIMAL", DataType::Decimal),
];

/// Fabric / Power BI tabular model types
pub const FABRIC_TYPES: &[(&str, DataType)] = &[
    ("String", DataType::String),
    ("Int64", DataType::Int64),
    ("Double", DataType::Double),
    ("Boolean", DataType::Boolean),
    ("DateTime", DataType::DateTime),
    ("Decimal", DataType::Decimal),
];

static NATIVE_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9_]*)\s*(\(\s*\d+\s*(?:,\s*\d+\s*)?\))?$").unwrap()
});

/// A native type name with no entry in the dialect's table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownNativeType {
    pub dialect: Dialect,
    pub native: String,
    /// Carries a length or precision suffix
    pub parameterised: bool,
}

impl std::fmt::Display for UnknownNativeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.parameterised {
            write!(
                f,
                "{} type '{}' has a length or precision that cannot be carried through",
                self.dialect, self.native
            )
        } else {
            write!(f, "unmapped {} type '{}'", self.dialect, self.native)
        }
    }
}

impl std::error::Error for UnknownNativeType {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_bijective() {
        for dialect in [Dialect::Snowflake, Dialect::Fabric] {
            for data_type in DataType::ALL {
                let hits = dialect
                    .table()
                    .iter()
                    .filter(|(_, t)| *t == data_type)
                    .count();
                assert_eq!(hits, 1, "{} maps {} {} times", dialect, data_type, hits);
            }
            assert_eq!(dialect.table().len(), DataType::ALL.len());
        }
    }

    #[test]
    fn test_native_round_trip() {
        let candidates = [
            "VARCHAR",
            "varchar",
            "Varchar",
            "VARCHAR(255)",
            "DECIMAL(38,2)",
            "DECIMAL(38, 2)",
            "decimal",
            "INTEGER",
            "String",
            "string",
            "int64",
            "Int64",
            " Double",
        ];
        for dialect in [Dialect::Snowflake, Dialect::Fabric] {
            for native in dialect.native_names().chain(candidates) {
                if let Ok(normalized) = dialect.from_native(native) {
                    assert_eq!(dialect.to_native(normalized), native, "{} {}", dialect, native);
                }
            }
        }
    }

    #[test]
    fn test_native_names_are_exact() {
        assert_eq!(Dialect::Snowflake.from_native("VARCHAR"), Ok(DataType::String));
        assert!(Dialect::Snowflake.from_native("varchar").is_err());
        assert!(Dialect::Fabric.from_native("int64").is_err());
    }

    #[test]
    fn test_parameterised_types_rejected() {
        let err = Dialect::Snowflake.from_native("DECIMAL(38,2)").unwrap_err();
        assert!(err.parameterised);
        assert!(err.to_string().contains("precision"));
        assert!(Dialect::Snowflake.from_native("VARCHAR(255)").is_err());
        assert!(Dialect::Fabric.from_native("String(10)").is_err());
    }

    #[test]
    fn test_unknown_types_rejected() {
        let err = Dialect::Snowflake.from_native("GEOGRAPHY").unwrap_err();
        assert_eq!(err.native, "GEOGRAPHY");
        assert!(!err.parameterised);
        assert!(Dialect::Snowflake.from_native("VARCHAR(abc)").is_err());
        assert!(Dialect::Fabric.from_native("").is_err());
        // Aliases are not part of the bijection
        assert!(Dialect::Snowflake.from_native("BIGINT").is_err());
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("Snowflake".parse::<Dialect>(), Ok(Dialect::Snowflake));
        assert_eq!("powerbi".parse::<Dialect>(), Ok(Dialect::Fabric));
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
