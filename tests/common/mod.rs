#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use pagila_core::catalog::{TableDef, Tables};
use pagila_core::dataframe::DataFrame;
use pagila_core::df;
use pagila_core::io::TableSource;
use pagila_error::{pagila_err, PagilaResult};
use rust_decimal::Decimal;

pub fn init() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// A small pagila instance with unqualified column names.
///
/// - Drama has no films and film 6 has no inventory.
/// - City 1 (`al-Qatif`) matches both `a%` and `%-%`, city 3 (`Rio-Claro`) only `%-%`.
pub fn frames() -> Vec<(&'static str, DataFrame)> {
    vec![
        (
            "category",
            df! {
                "category_id" => vec![1i64, 2, 3, 4],
                "name" => vec!["Action", "Comedy", "Children", "Drama"],
            }
            .unwrap(),
        ),
        (
            "film",
            df! {
                "film_id" => vec![1i64, 2, 3, 4, 5, 6],
                "title" => vec![
                    "ACADEMY DINOSAUR",
                    "ACE GOLDFINGER",
                    "ADAPTATION HOLES",
                    "AFFAIR PREJUDICE",
                    "AGENT TRUMAN",
                    "AIRPLANE SIERRA",
                ],
                "rental_duration" => vec![6i64, 3, 7, 5, 6, 3],
            }
            .unwrap(),
        ),
        (
            "film_category",
            df! {
                "film_id" => vec![1i64, 2, 3, 4, 5, 6],
                "category_id" => vec![1i64, 1, 2, 3, 3, 3],
            }
            .unwrap(),
        ),
        (
            "actor",
            df! {
                "actor_id" => vec![1i64, 2, 3, 4, 5],
                "first_name" => vec!["PENELOPE", "NICK", "ED", "JENNIFER", "JOHNNY"],
                "last_name" => vec!["GUINESS", "WAHLBERG", "CHASE", "DAVIS", "LOLLOBRIGIDA"],
            }
            .unwrap(),
        ),
        (
            "film_actor",
            df! {
                "actor_id" => vec![1i64, 1, 1, 1, 2, 2, 3, 3, 4, 5],
                "film_id" => vec![1i64, 4, 5, 6, 4, 5, 2, 6, 3, 1],
            }
            .unwrap(),
        ),
        (
            "inventory",
            df! {
                "inventory_id" => vec![1i64, 2, 3, 4, 5, 6],
                "film_id" => vec![1i64, 1, 2, 3, 4, 5],
                "store_id" => vec![1i64, 2, 1, 1, 2, 1],
            }
            .unwrap(),
        ),
        (
            "rental",
            df! {
                "rental_id" => vec![1i64, 2, 3, 4, 5, 6, 7],
                "inventory_id" => vec![1i64, 2, 3, 4, 5, 6, 1],
                "customer_id" => vec![1i64, 2, 1, 3, 2, 3, 3],
            }
            .unwrap(),
        ),
        (
            "payment",
            df! {
                "payment_id" => vec![1i64, 2, 3, 4, 5, 6, 7],
                "rental_id" => vec![1i64, 2, 3, 4, 5, 6, 7],
                "amount" => vec![
                    dec("2.99"),
                    dec("0.99"),
                    dec("4.99"),
                    dec("1.99"),
                    dec("5.99"),
                    dec("2.99"),
                    dec("0.99"),
                ],
            }
            .unwrap(),
        ),
        (
            "city",
            df! {
                "city_id" => vec![1i64, 2, 3, 4],
                "city" => vec!["al-Qatif", "Aurora", "Rio-Claro", "Abha"],
            }
            .unwrap(),
        ),
        (
            "address",
            df! {
                "address_id" => vec![1i64, 2, 3, 4],
                "city_id" => vec![1i64, 2, 3, 1],
            }
            .unwrap(),
        ),
        (
            "customer",
            df! {
                "customer_id" => vec![1i64, 2, 3, 4],
                "address_id" => vec![1i64, 2, 3, 4],
                "active" => vec![1i64, 0, 1, 0],
            }
            .unwrap(),
        ),
    ]
}

pub fn tables() -> Tables {
    Tables::from_map(frames().into_iter().collect()).unwrap()
}

/// Serves fixture frames, optionally slowly or with one broken table.
pub struct MemorySource {
    pub frames: HashMap<&'static str, DataFrame>,
    pub delay: Option<Duration>,
    pub broken: Option<&'static str>,
}

impl MemorySource {
    pub fn new() -> Self {
        MemorySource {
            frames: frames().into_iter().collect(),
            delay: None,
            broken: None,
        }
    }
}

impl TableSource for MemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn fetch<'a>(&'a self, table: &'a TableDef) -> BoxFuture<'a, PagilaResult<DataFrame>> {
        async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.broken == Some(table.name) {
                return Err(pagila_err!(FetchError: "connection reset while reading `{}`", table.name));
            }
            self.frames
                .get(table.name)
                .cloned()
                .ok_or_else(|| pagila_err!(FetchError: "no table `{}`", table.name))
        }
        .boxed()
    }
}
