use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse classification of an engine-native type name, used to pick
/// operators, aggregates and literals that stay valid for the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeFamily {
    Integer,
    Decimal,
    Character,
    Boolean,
    Date,
    Timestamp,
    Time,
    Other,
}

impl TypeFamily {
    pub fn from_type_name(data_type: &str) -> Self {
        let t = data_type.trim().to_lowercase();
        if t.starts_with("bool") || t == "tinyint(1)" {
            TypeFamily::Boolean
        } else if t.starts_with("interval") || t.starts_with("bit") || t == "money" {
            // No implicit comparison with boolean or numeric literals.
            TypeFamily::Other
        } else if t.starts_with("int")
            || ["bigint", "smallint", "tinyint", "mediumint"]
                .iter()
                .any(|i| t.starts_with(i))
            || t.ends_with("serial")
        {
            TypeFamily::Integer
        } else if t.starts_with("numeric")
            || t.starts_with("decimal")
            || t.starts_with("real")
            || t.starts_with("float")
            || t.starts_with("double")
        {
            TypeFamily::Decimal
        } else if t.contains("char") || t == "text" || t.ends_with("text") || t == "citext" {
            TypeFamily::Character
        } else if t.starts_with("timestamp") || t == "datetime" {
            TypeFamily::Timestamp
        } else if t == "date" {
            TypeFamily::Date
        } else if t.starts_with("time") {
            TypeFamily::Time
        } else {
            TypeFamily::Other
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, TypeFamily::Integer | TypeFamily::Decimal)
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, TypeFamily::Date | TypeFamily::Timestamp | TypeFamily::Time)
    }

    /// Whether the column can be compared against a synthesized literal.
    pub fn is_comparable(self) -> bool {
        self != TypeFamily::Other
    }

    /// Whether MIN/MAX are meaningful for the column.
    pub fn is_ordered(self) -> bool {
        self.is_numeric() || self.is_temporal() || self == TypeFamily::Character
    }
}

/// A `table.column` name pair. Foreign keys hold these instead of pointers;
/// they are resolved against a [`Schema`] only when a join graph is built.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnIndex {
    pub name: String,
    pub is_unique: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub max_length: Option<i32>,
    /// 1-based, unique within the table.
    pub ordinal_position: u32,
    pub is_auto_increment: bool,
    pub is_primary_key: bool,
    pub has_index: bool,
    pub is_unique_index: bool,
    /// Every non-primary-key index covering this column.
    pub indexes: Vec<ColumnIndex>,
    /// Referenced table/column when this column is a foreign key.
    pub references: Option<ColumnRef>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, ordinal_position: u32) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            max_length: None,
            ordinal_position,
            is_auto_increment: false,
            is_primary_key: false,
            has_index: false,
            is_unique_index: false,
            indexes: Vec::new(),
            references: None,
        }
    }

    pub fn is_foreign_key(&self) -> bool {
        self.references.is_some()
    }

    pub fn type_family(&self) -> TypeFamily {
        TypeFamily::from_type_name(&self.data_type)
    }

    /// Marks the column as a foreign key. Empty table or column names are
    /// ignored so a flagged column always carries a usable reference.
    pub fn set_reference(&mut self, table: &str, column: &str) -> bool {
        if table.is_empty() || column.is_empty() {
            return false;
        }
        self.references = Some(ColumnRef::new(table, column));
        true
    }

    pub fn add_index(&mut self, index_name: &str, is_unique: bool) {
        self.has_index = true;
        self.is_unique_index |= is_unique;
        if !self.indexes.iter().any(|i| i.name == index_name) {
            self.indexes.push(ColumnIndex {
                name: index_name.to_string(),
                is_unique,
            });
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub namespace: String,
    /// Ordered by ordinal position.
    pub columns: Vec<Column>,
    pub row_estimate: Option<i64>,
}

impl Table {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            columns: Vec::new(),
            row_estimate: None,
        }
    }

    /// Appends a column, assigning the next ordinal position.
    pub fn push_column(&mut self, mut column: Column) {
        column.ordinal_position = self.columns.len() as u32 + 1;
        self.columns.push(column);
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_primary_key)
    }

    /// Distinct `(index name, is unique)` pairs over all columns, sorted by name.
    pub fn indexes(&self) -> Vec<(&str, bool)> {
        let mut indexes: BTreeMap<&str, bool> = BTreeMap::new();
        for column in &self.columns {
            for index in &column.indexes {
                *indexes.entry(index.name.as_str()).or_insert(false) |= index.is_unique;
            }
        }
        indexes.into_iter().collect()
    }
}

/// Directed foreign key relationship between two tables of one [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl ForeignKeyEdge {
    pub fn touches(&self, table: &str) -> bool {
        self.from_table == table || self.to_table == table
    }

    /// The endpoint opposite to `table`.
    pub fn other_end(&self, table: &str) -> &str {
        if self.from_table == table {
            &self.to_table
        } else {
            &self.from_table
        }
    }

    pub fn from_ref(&self) -> ColumnRef {
        ColumnRef::new(&self.from_table, &self.from_column)
    }

    pub fn to_ref(&self) -> ColumnRef {
        ColumnRef::new(&self.to_table, &self.to_column)
    }
}

/// The analyzed structure of one database source.
///
/// Tables are kept in a `BTreeMap`, so every iteration is ordered by name.
/// A schema is never merged into: re-analysis produces a fresh value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub source: String,
    pub tables: BTreeMap<String, Table>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub is_analyzed: bool,
}

impl Schema {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            tables: BTreeMap::new(),
            analyzed_at: None,
            is_analyzed: false,
        }
    }

    /// Builds a fully analyzed schema. A later table with a duplicate name
    /// replaces the earlier one.
    pub fn analyzed(
        source: impl Into<String>,
        tables: impl IntoIterator<Item = Table>,
        analyzed_at: DateTime<Utc>,
    ) -> Self {
        let mut schema = Self::new(source);
        for table in tables {
            schema.insert_table(table);
        }
        schema.analyzed_at = Some(analyzed_at);
        schema.is_analyzed = true;
        schema
    }

    pub fn insert_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Foreign keys whose referenced table and column both exist in this schema.
    pub fn foreign_key_edges(&self) -> Vec<ForeignKeyEdge> {
        self.tables
            .values()
            .flat_map(|table| {
                table.columns.iter().filter_map(move |column| {
                    let target = column.references.as_ref()?;
                    self.table(&target.table)?.column(&target.column)?;
                    Some(ForeignKeyEdge {
                        from_table: table.name.clone(),
                        from_column: column.name.clone(),
                        to_table: target.table.clone(),
                        to_column: target.column.clone(),
                    })
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop() -> Schema {
        let mut users = Table::new("users", "public");
        let mut id = Column::new("id", "integer", 0);
        id.is_primary_key = true;
        users.push_column(id);
        users.push_column(Column::new("name", "character varying", 0));

        let mut orders = Table::new("orders", "public");
        orders.push_column(Column::new("id", "integer", 0));
        let mut user_id = Column::new("user_id", "integer", 0);
        user_id.set_reference("users", "id");
        orders.push_column(user_id);
        let mut coupon = Column::new("coupon_id", "integer", 0);
        coupon.set_reference("billing.coupons", "id");
        orders.push_column(coupon);

        Schema::analyzed("test", vec![users, orders], Utc::now())
    }

    #[test]
    fn test_type_family() {
        assert_eq!(TypeFamily::from_type_name("integer"), TypeFamily::Integer);
        assert_eq!(TypeFamily::from_type_name("bigint"), TypeFamily::Integer);
        assert_eq!(TypeFamily::from_type_name("numeric"), TypeFamily::Decimal);
        assert_eq!(TypeFamily::from_type_name("double precision"), TypeFamily::Decimal);
        assert_eq!(TypeFamily::from_type_name("character varying"), TypeFamily::Character);
        assert_eq!(TypeFamily::from_type_name("VARCHAR"), TypeFamily::Character);
        assert_eq!(TypeFamily::from_type_name("boolean"), TypeFamily::Boolean);
        assert_eq!(TypeFamily::from_type_name("date"), TypeFamily::Date);
        assert_eq!(
            TypeFamily::from_type_name("timestamp without time zone"),
            TypeFamily::Timestamp
        );
        assert_eq!(TypeFamily::from_type_name("time with time zone"), TypeFamily::Time);
        assert_eq!(TypeFamily::from_type_name("jsonb"), TypeFamily::Other);
        assert_eq!(TypeFamily::from_type_name("uuid"), TypeFamily::Other);
        assert_eq!(TypeFamily::from_type_name("interval"), TypeFamily::Other);
        assert_eq!(TypeFamily::from_type_name("point"), TypeFamily::Other);
        assert_eq!(TypeFamily::from_type_name("bit"), TypeFamily::Other);
        assert_eq!(TypeFamily::from_type_name("bit varying"), TypeFamily::Other);
        assert_eq!(TypeFamily::from_type_name("money"), TypeFamily::Other);
        assert_eq!(TypeFamily::from_type_name("tinyint(1)"), TypeFamily::Boolean);
    }

    #[test]
    fn test_push_column_assigns_ordinals() {
        let schema = shop();
        let orders = schema.table("orders").unwrap();
        let ordinals: Vec<u32> = orders.columns.iter().map(|c| c.ordinal_position).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_reference_is_rejected() {
        let mut column = Column::new("owner", "integer", 1);
        assert!(!column.set_reference("", "id"));
        assert!(!column.is_foreign_key());
    }

    #[test]
    fn test_unresolvable_foreign_key_has_no_edge() {
        let schema = shop();
        let edges = schema.foreign_key_edges();
        assert_eq!(
            edges,
            vec![ForeignKeyEdge {
                from_table: "orders".to_string(),
                from_column: "user_id".to_string(),
                to_table: "users".to_string(),
                to_column: "id".to_string(),
            }]
        );
        // The cross-schema reference is still kept on the column.
        let coupon = schema.table("orders").unwrap().column("coupon_id").unwrap();
        assert!(coupon.is_foreign_key());
    }

    #[test]
    fn test_indexes_are_distinct() {
        let mut table = Table::new("items", "public");
        let mut sku = Column::new("sku", "text", 0);
        sku.add_index("items_sku_key", true);
        sku.add_index("items_sku_key", true);
        sku.add_index("items_sku_name_idx", false);
        table.push_column(sku);
        let mut name = Column::new("name", "text", 0);
        name.add_index("items_sku_name_idx", false);
        table.push_column(name);

        let sku = table.column("sku").unwrap();
        assert_eq!(sku.indexes.len(), 2);
        assert!(sku.is_unique_index);
        assert_eq!(
            table.indexes(),
            vec![("items_sku_key", true), ("items_sku_name_idx", false)]
        );
    }
}
