use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::ValueType;

/// Native data types that attributes and collection elements can have.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DbType {
    Varchar,
    NVarchar,
    Char,
    NChar,
    Raw,
    NativeFloat,
    NativeDouble,
    NativeInt,
    Number,
    Date,
    Timestamp,
    TimestampTz,
    TimestampLtz,
    Clob,
    NClob,
    Blob,
    Bfile,
    Boolean,
    Object,
}

impl Display for DbType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl DbType {
    pub fn name(&self) -> &'static str {
        match self {
            DbType::Varchar => "VARCHAR2",
            DbType::NVarchar => "NVARCHAR2",
            DbType::Char => "CHAR",
            DbType::NChar => "NCHAR",
            DbType::Raw => "RAW",
            DbType::NativeFloat => "BINARY_FLOAT",
            DbType::NativeDouble => "BINARY_DOUBLE",
            DbType::NativeInt => "BINARY_INTEGER",
            DbType::Number => "NUMBER",
            DbType::Date => "DATE",
            DbType::Timestamp => "TIMESTAMP",
            DbType::TimestampTz => "TIMESTAMP WITH TIME ZONE",
            DbType::TimestampLtz => "TIMESTAMP WITH LOCAL TIME ZONE",
            DbType::Clob => "CLOB",
            DbType::NClob => "NCLOB",
            DbType::Blob => "BLOB",
            DbType::Bfile => "BFILE",
            DbType::Boolean => "BOOLEAN",
            DbType::Object => "OBJECT",
        }
    }

    /// The numeric type code the native layer uses for this type.
    pub fn code(&self) -> u16 {
        match self {
            DbType::Varchar => 2001,
            DbType::NVarchar => 2002,
            DbType::Char => 2003,
            DbType::NChar => 2004,
            DbType::Raw => 2006,
            DbType::NativeFloat => 2007,
            DbType::NativeDouble => 2008,
            DbType::NativeInt => 2009,
            DbType::Number => 2010,
            DbType::Date => 2011,
            DbType::Timestamp => 2012,
            DbType::TimestampTz => 2013,
            DbType::TimestampLtz => 2014,
            DbType::Clob => 2017,
            DbType::NClob => 2018,
            DbType::Blob => 2019,
            DbType::Bfile => 2020,
            DbType::Boolean => 2022,
            DbType::Object => 2023,
        }
    }

    /// Map a native type code. Codes without a mapping (intervals, `ROWID`,
    /// `ANYDATA` and friends) return `None`.
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            2001 => DbType::Varchar,
            2002 => DbType::NVarchar,
            2003 => DbType::Char,
            2004 => DbType::NChar,
            2006 => DbType::Raw,
            2007 => DbType::NativeFloat,
            2008 => DbType::NativeDouble,
            2009 => DbType::NativeInt,
            2010 => DbType::Number,
            2011 => DbType::Date,
            2012 => DbType::Timestamp,
            2013 => DbType::TimestampTz,
            2014 => DbType::TimestampLtz,
            2017 => DbType::Clob,
            2018 => DbType::NClob,
            2019 => DbType::Blob,
            2020 => DbType::Bfile,
            2022 => DbType::Boolean,
            2023 => DbType::Object,
            _ => return None,
        })
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            DbType::Varchar | DbType::NVarchar | DbType::Char | DbType::NChar
        )
    }

    pub fn is_timestamp(&self) -> bool {
        matches!(
            self,
            DbType::Timestamp | DbType::TimestampTz | DbType::TimestampLtz
        )
    }

    pub fn is_lob(&self) -> bool {
        matches!(
            self,
            DbType::Clob | DbType::NClob | DbType::Blob | DbType::Bfile
        )
    }

    /// The external type a value of this type is read as when the caller does
    /// not ask for one.
    pub fn default_value_type(&self) -> ValueType {
        match self {
            DbType::Varchar
            | DbType::NVarchar
            | DbType::Char
            | DbType::NChar
            | DbType::Raw => ValueType::Bytes,
            DbType::NativeInt => ValueType::Int64,
            DbType::NativeFloat => ValueType::Float,
            DbType::NativeDouble | DbType::Number => ValueType::Double,
            DbType::Date | DbType::Timestamp | DbType::TimestampTz | DbType::TimestampLtz => {
                ValueType::Timestamp
            }
            DbType::Boolean => ValueType::Boolean,
            DbType::Object => ValueType::Object,
            DbType::Clob | DbType::NClob | DbType::Blob | DbType::Bfile => ValueType::Lob,
        }
    }
}

// Parses declared type names, ignoring length, precision and scale qualifiers.
impl FromStr for DbType {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let original = s.trim().to_owned();
        let lower = original.to_ascii_lowercase();
        let s = match lower.find('(') {
            Some(pos) if !lower.starts_with("timestamp") => lower[..pos].trim_end(),
            _ => lower.as_str(),
        };
        Ok(match s {
            "binary_integer" | "pls_integer" => DbType::NativeInt,
            "binary_float" => DbType::NativeFloat,
            "binary_double" => DbType::NativeDouble,
            "boolean" | "bool" => DbType::Boolean,
            "date" => DbType::Date,
            "raw" => DbType::Raw,
            "blob" => DbType::Blob,
            "clob" => DbType::Clob,
            "nclob" => DbType::NClob,
            "bfile" => DbType::Bfile,

            _ if s.starts_with("timestamp") && s.ends_with("with local time zone") => {
                DbType::TimestampLtz
            }
            _ if s.starts_with("timestamp") && s.ends_with("with time zone") => {
                DbType::TimestampTz
            }
            _ if s.starts_with("timestamp") => DbType::Timestamp,

            _ if s.starts_with("nvarchar") => DbType::NVarchar,
            _ if s.starts_with("varchar") => DbType::Varchar,
            _ if s.starts_with("nchar") || s.starts_with("national char") => DbType::NChar,
            _ if s.starts_with("char") => DbType::Char,

            "number" | "numeric" | "decimal" | "dec" | "integer" | "int" | "smallint"
            | "float" | "real" | "double precision" => DbType::Number,

            _ => {
                return Err(crate::Error::TypeNotFound {
                    type_name: original,
                });
            }
        })
    }
}

#[test]
fn test_data_type_from_str() -> crate::Result<()> {
    assert_eq!(DbType::Varchar, "VARCHAR2(100)".parse()?);
    assert_eq!(DbType::Varchar, "varchar(20)".parse()?);
    assert_eq!(DbType::NVarchar, "NVARCHAR2(30)".parse()?);
    assert_eq!(DbType::Char, "CHAR(1)".parse()?);
    assert_eq!(DbType::NChar, "NCHAR(2)".parse()?);
    assert_eq!(DbType::Raw, "RAW(16)".parse()?);

    assert_eq!(DbType::NativeInt, "BINARY_INTEGER".parse()?);
    assert_eq!(DbType::NativeInt, "PLS_INTEGER".parse()?);
    assert_eq!(DbType::NativeFloat, "BINARY_FLOAT".parse()?);
    assert_eq!(DbType::NativeDouble, "BINARY_DOUBLE".parse()?);

    assert_eq!(DbType::Number, "NUMBER".parse()?);
    assert_eq!(DbType::Number, "NUMBER(10, 2)".parse()?);
    assert_eq!(DbType::Number, "INTEGER".parse()?);
    assert_eq!(DbType::Number, "FLOAT".parse()?);

    assert_eq!(DbType::Date, "DATE".parse()?);
    assert_eq!(DbType::Timestamp, "TIMESTAMP".parse()?);
    assert_eq!(DbType::Timestamp, "TIMESTAMP(3)".parse()?);
    assert_eq!(DbType::TimestampTz, "TIMESTAMP WITH TIME ZONE".parse()?);
    assert_eq!(DbType::TimestampTz, "TIMESTAMP(6) WITH TIME ZONE".parse()?);
    assert_eq!(
        DbType::TimestampLtz,
        "TIMESTAMP WITH LOCAL TIME ZONE".parse()?
    );

    assert_eq!(DbType::Boolean, "BOOLEAN".parse()?);
    assert_eq!(DbType::Clob, "CLOB".parse()?);
    assert_eq!(DbType::NClob, "NCLOB".parse()?);
    assert_eq!(DbType::Blob, "BLOB".parse()?);
    assert_eq!(DbType::Bfile, "BFILE".parse()?);

    Ok(())
}

#[test]
fn test_unknown_type_from_str() {
    match "SYS.ANYDATA".parse::<DbType>() {
        Err(crate::Error::TypeNotFound { type_name }) => {
            assert_eq!(type_name, "SYS.ANYDATA");
        }
        _ => panic!("expected TypeNotFound error"),
    }
}

#[test]
fn test_codes_round_trip() {
    for ty in [DbType::Varchar, DbType::Number, DbType::TimestampLtz, DbType::Object] {
        assert_eq!(DbType::from_code(ty.code()), Some(ty));
    }
    assert!(DbType::from_code(2015).is_none());
}
