//! Reflected schema metadata: tables, columns, keys.

/// Semantic column type, mapped from `information_schema.columns.data_type`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnType {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal,
    Text,
    Boolean,
    Uuid,
    Date,
    Timestamp,
    TimestampTz,
    Json,
    Bytes,
    Other(String),
}

impl ColumnType {
    pub fn from_data_type(data_type: &str) -> Self {
        match data_type.to_lowercase().as_str() {
            "smallint" => ColumnType::SmallInt,
            "integer" => ColumnType::Integer,
            "bigint" => ColumnType::BigInt,
            "real" => ColumnType::Real,
            "double precision" => ColumnType::Double,
            "numeric" | "decimal" | "money" => ColumnType::Decimal,
            "character varying" | "character" | "varchar" | "text" | "citext" | "name" => {
                ColumnType::Text
            }
            "boolean" => ColumnType::Boolean,
            "uuid" => ColumnType::Uuid,
            "date" => ColumnType::Date,
            "timestamp without time zone" | "timestamp" => ColumnType::Timestamp,
            "timestamp with time zone" | "timestamptz" => ColumnType::TimestampTz,
            "json" | "jsonb" => ColumnType::Json,
            "bytea" => ColumnType::Bytes,
            other => ColumnType::Other(other.to_string()),
        }
    }

    /// Short name used in /<collection>/meta output.
    pub fn as_str(&self) -> &str {
        match self {
            ColumnType::SmallInt => "smallint",
            ColumnType::Integer => "integer",
            ColumnType::BigInt => "bigint",
            ColumnType::Real => "real",
            ColumnType::Double => "double",
            ColumnType::Decimal => "decimal",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::Uuid => "uuid",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
            ColumnType::TimestampTz => "timestamptz",
            ColumnType::Json => "json",
            ColumnType::Bytes => "bytes",
            ColumnType::Other(s) => s.as_str(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ColumnType::Text)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt
        )
    }

    /// SQL cast appended to the bind placeholder (e.g. `$1::uuid`). Casting
    /// every known type keeps string-bound values (timestamps, uuids,
    /// decimals) and typed NULLs valid regardless of the wire type the
    /// client value arrived as.
    pub fn bind_cast(&self) -> Option<&'static str> {
        match self {
            ColumnType::SmallInt => Some("int2"),
            ColumnType::Integer => Some("int4"),
            ColumnType::BigInt => Some("int8"),
            ColumnType::Real => Some("float4"),
            ColumnType::Double => Some("float8"),
            ColumnType::Decimal => Some("numeric"),
            ColumnType::Text => Some("text"),
            ColumnType::Boolean => Some("boolean"),
            ColumnType::Uuid => Some("uuid"),
            ColumnType::Date => Some("date"),
            ColumnType::Timestamp => Some("timestamp"),
            ColumnType::TimestampTz => Some("timestamptz"),
            ColumnType::Json => Some("jsonb"),
            ColumnType::Bytes => Some("bytea"),
            ColumnType::Other(_) => None,
        }
    }

    /// Types selected as `col::text` so the JSON representation keeps exact
    /// digits (numeric) instead of going through floating point.
    pub fn select_as_text(&self) -> bool {
        matches!(self, ColumnType::Decimal)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    /// Whether the column has a database-side default (sequence, NOW(), ...).
    pub has_default: bool,
    pub ordinal: i32,
}

/// One foreign-key edge: our column references a column in another table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    /// Ordinal order, as declared in the database.
    pub columns: Vec<ColumnSchema>,
    /// Primary-key columns in constraint order; empty when the table has none.
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// What to do with a reflected table that has no primary key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkPolicy {
    /// Fail reflection; the process must not start serving.
    Reject,
    /// Leave the table out of the API.
    Skip,
    /// ALTER TABLE to add a primary key spanning every column. Mutates the
    /// physical schema; opt-in only.
    Synthesize,
}
