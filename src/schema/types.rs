// src/schema/types.rs

/// A single destination column as reported by `SHOW FULL COLUMNS`.
#[derive(Debug, PartialEq, Clone, Eq, Hash)]
pub struct ColumnSchema {
    pub name: String,
    /// Declared type, lower-cased, e.g. `varchar(50)` or `datetime`.
    pub declared_type: String,
    pub nullable: bool,
    /// Key role (`PRI`, `UNI`, `MUL` or empty).
    pub key: String,
}

impl ColumnSchema {
    /// Build from the raw `Field`, `Type`, `Null` and `Key` cells.
    pub fn from_show_columns(field: &str, ty: &str, null: &str, key: &str) -> Self {
        Self {
            name: field.to_string(),
            declared_type: ty.trim().to_ascii_lowercase(),
            nullable: null.trim().eq_ignore_ascii_case("YES"),
            key: key.trim().to_string(),
        }
    }

    /// `datetime`, `timestamp` and their fractional-second variants.
    pub fn is_datetime(&self) -> bool {
        let base = self.base_type();
        base == "datetime" || base == "timestamp"
    }

    /// char, varchar and the text family.
    pub fn is_character(&self) -> bool {
        let base = self.base_type();
        base.contains("char") || base.contains("text")
    }

    fn base_type(&self) -> &str {
        self.declared_type
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or("")
    }
}
