//! The eleven pagila tables the reports read, and the columns each is loaded with.

use ahash::HashMap;
use arrow_schema::{DataType, Field, Schema};
use pagila_error::{pagila_err, PagilaResult};

use crate::dataframe::DataFrame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Utf8,
    Boolean,
    Decimal { precision: u8, scale: i8 },
    Float64,
}

impl ColumnType {
    pub fn to_arrow(self) -> DataType {
        match self {
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Utf8 => DataType::Utf8,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Decimal { precision, scale } => DataType::Decimal128(precision, scale),
            ColumnType::Float64 => DataType::Float64,
        }
    }

    /// The Postgres type a column is cast to when selected.
    pub fn sql_type(self) -> String {
        match self {
            ColumnType::Int64 => "int8".to_string(),
            ColumnType::Utf8 => "text".to_string(),
            ColumnType::Boolean => "bool".to_string(),
            ColumnType::Decimal { precision, scale } => format!("numeric({precision},{scale})"),
            ColumnType::Float64 => "float8".to_string(),
        }
    }

    /// Whether a stored column of type `dtype` can be read as this type.
    pub fn accepts(self, dtype: &DataType) -> bool {
        match self {
            ColumnType::Int64 => dtype.is_integer(),
            ColumnType::Utf8 => matches!(dtype, DataType::Utf8 | DataType::LargeUtf8),
            ColumnType::Boolean => matches!(dtype, DataType::Boolean),
            ColumnType::Decimal { .. } => matches!(dtype, DataType::Decimal128(..)),
            ColumnType::Float64 => dtype.is_floating(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub dtype: ColumnType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableDef {
    /// `SELECT` of exactly the catalog columns, each cast to its catalog type.
    pub fn select_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("{0}::{1} AS {0}", c.name, c.dtype.sql_type()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT {columns} FROM {}", self.name)
    }

    /// The unqualified arrow schema of the table.
    pub fn schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|c| Field::new(c.name, c.dtype.to_arrow(), true))
                .collect::<Vec<_>>(),
        )
    }
}

macro_rules! table {
    ($ident:ident, $name:literal, [$($column:literal: $dtype:expr),+ $(,)?]) => {
        pub const $ident: TableDef = TableDef {
            name: $name,
            columns: &[$(ColumnDef { name: $column, dtype: $dtype }),+],
        };
    };
}

use ColumnType::{Int64, Utf8};

const fn decimal(precision: u8, scale: i8) -> ColumnType {
    ColumnType::Decimal { precision, scale }
}

table!(CATEGORY, "category", ["category_id": Int64, "name": Utf8]);
table!(FILM_CATEGORY, "film_category", ["film_id": Int64, "category_id": Int64]);
table!(FILM, "film", [
    "film_id": Int64,
    "title": Utf8,
    "description": Utf8,
    "release_year": Int64,
    "language_id": Int64,
    "rental_duration": Int64,
    "rental_rate": decimal(4, 2),
    "length": Int64,
    "replacement_cost": decimal(5, 2),
    "rating": Utf8,
]);
table!(ACTOR, "actor", ["actor_id": Int64, "first_name": Utf8, "last_name": Utf8]);
table!(FILM_ACTOR, "film_actor", ["actor_id": Int64, "film_id": Int64]);
table!(INVENTORY, "inventory", ["inventory_id": Int64, "film_id": Int64, "store_id": Int64]);
table!(RENTAL, "rental", [
    "rental_id": Int64,
    "inventory_id": Int64,
    "customer_id": Int64,
    "staff_id": Int64,
]);
table!(PAYMENT, "payment", [
    "payment_id": Int64,
    "customer_id": Int64,
    "staff_id": Int64,
    "rental_id": Int64,
    "amount": decimal(5, 2),
]);
table!(CITY, "city", ["city_id": Int64, "city": Utf8, "country_id": Int64]);
table!(ADDRESS, "address", [
    "address_id": Int64,
    "address": Utf8,
    "district": Utf8,
    "city_id": Int64,
    "postal_code": Utf8,
    "phone": Utf8,
]);
table!(CUSTOMER, "customer", [
    "customer_id": Int64,
    "store_id": Int64,
    "first_name": Utf8,
    "last_name": Utf8,
    "email": Utf8,
    "address_id": Int64,
    "active": Int64,
]);

/// Every table, in load order.
pub const TABLES: [TableDef; 11] = [
    CATEGORY,
    FILM_CATEGORY,
    FILM,
    ACTOR,
    FILM_ACTOR,
    INVENTORY,
    RENTAL,
    PAYMENT,
    CITY,
    ADDRESS,
    CUSTOMER,
];

/// Read-only snapshots of the loaded tables. Columns are qualified as `table.column`.
#[derive(Clone, Debug)]
pub struct Tables {
    pub category: DataFrame,
    pub film_category: DataFrame,
    pub film: DataFrame,
    pub actor: DataFrame,
    pub film_actor: DataFrame,
    pub inventory: DataFrame,
    pub rental: DataFrame,
    pub payment: DataFrame,
    pub city: DataFrame,
    pub address: DataFrame,
    pub customer: DataFrame,
}

impl Tables {
    /// Assembles the snapshot from frames keyed by table name, qualifying their columns.
    pub fn from_map(mut frames: HashMap<&'static str, DataFrame>) -> PagilaResult<Self> {
        let mut take = |table: TableDef| {
            frames
                .remove(table.name)
                .ok_or_else(|| pagila_err!(FetchError: "table `{}` was not loaded", table.name))?
                .qualify(table.name)
        };

        Ok(Tables {
            category: take(CATEGORY)?,
            film_category: take(FILM_CATEGORY)?,
            film: take(FILM)?,
            actor: take(ACTOR)?,
            film_actor: take(FILM_ACTOR)?,
            inventory: take(INVENTORY)?,
            rental: take(RENTAL)?,
            payment: take(PAYMENT)?,
            city: take(CITY)?,
            address: take(ADDRESS)?,
            customer: take(CUSTOMER)?,
        })
    }

    /// The tables paired with their definitions, in load order.
    pub fn iter(&self) -> impl Iterator<Item = (TableDef, &DataFrame)> {
        TABLES.into_iter().zip([
            &self.category,
            &self.film_category,
            &self.film,
            &self.actor,
            &self.film_actor,
            &self.inventory,
            &self.rental,
            &self.payment,
            &self.city,
            &self.address,
            &self.customer,
        ])
    }
}

#[cfg(test)]
mod tests {
    use ahash::HashMapExt;

    use super::*;

    #[test]
    fn test_select_sql_casts_every_column() {
        assert_eq!(
            PAYMENT.select_sql(),
            "SELECT payment_id::int8 AS payment_id, customer_id::int8 AS customer_id, \
             staff_id::int8 AS staff_id, rental_id::int8 AS rental_id, \
             amount::numeric(5,2) AS amount FROM payment"
        );
    }

    #[test]
    fn test_column_type_accepts() {
        assert!(Int64.accepts(&DataType::Int16));
        assert!(!Int64.accepts(&DataType::Utf8));
        assert!(decimal(5, 2).accepts(&DataType::Decimal128(10, 2)));
        assert!(Utf8.accepts(&DataType::LargeUtf8));
    }

    #[test]
    fn test_tables_requires_every_table() {
        let mut frames = HashMap::new();
        for table in TABLES.iter().skip(1) {
            frames.insert(table.name, DataFrame::empty());
        }
        let err = Tables::from_map(frames).unwrap_err();
        assert!(err.to_string().contains("category"));
    }
}
