//! The seven pagila reports.
//!
//! Every report is a fixed pipeline of relational operators over the qualified table
//! snapshots in [`Tables`]; none of them mutates its inputs.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use pagila_error::PagilaResult;

use crate::catalog::Tables;
use crate::constants::JoinType;
use crate::dataframe::DataFrame;
use crate::expr::{col, dense_rank, lit, when};

/// Number of films per category, most films first.
///
/// Both joins are left joins, so a category without films survives with a count of 0.
pub fn films_per_category(
    category: &DataFrame,
    film_category: &DataFrame,
    film: &DataFrame,
) -> PagilaResult<DataFrame> {
    category
        .join(
            film_category,
            &["category.category_id"],
            &["film_category.category_id"],
            JoinType::Left,
        )?
        .join(film, &["film_category.film_id"], &["film.film_id"], JoinType::Left)?
        .group_by(&["category.name"])
        .agg(&[col("film.film_id").count().alias("number_of_films")])?
        .sort(&["number_of_films"], true)
}

/// The ten actors whose films were rented the most.
pub fn top_actors_by_rentals(
    actor: &DataFrame,
    film_actor: &DataFrame,
    film: &DataFrame,
    inventory: &DataFrame,
    rental: &DataFrame,
) -> PagilaResult<DataFrame> {
    let joined = actor
        .join(film_actor, &["actor.actor_id"], &["film_actor.actor_id"], JoinType::Inner)?
        .join(film, &["film_actor.film_id"], &["film.film_id"], JoinType::Inner)?
        .join(inventory, &["film.film_id"], &["inventory.film_id"], JoinType::Inner)?
        .join(
            rental,
            &["inventory.inventory_id"],
            &["rental.inventory_id"],
            JoinType::Inner,
        )?;

    // A strict row cutoff: ties straddling the tenth row are not widened.
    Ok(joined
        .group_by(&["actor.first_name", "actor.last_name", "actor.actor_id"])
        .agg(&[col("rental.rental_id").count().alias("rental_count")])?
        .sort(&["rental_count"], true)?
        .select(&[col("first_name"), col("last_name"), col("rental_count")])?
        .limit(10))
}

/// The category with the highest total payment amount. One row, even on ties.
pub fn top_spend_category(
    category: &DataFrame,
    film_category: &DataFrame,
    film: &DataFrame,
    inventory: &DataFrame,
    rental: &DataFrame,
    payment: &DataFrame,
) -> PagilaResult<DataFrame> {
    let joined = category
        .join(
            film_category,
            &["category.category_id"],
            &["film_category.category_id"],
            JoinType::Inner,
        )?
        .join(film, &["film_category.film_id"], &["film.film_id"], JoinType::Inner)?
        .join(inventory, &["film.film_id"], &["inventory.film_id"], JoinType::Inner)?
        .join(
            rental,
            &["inventory.inventory_id"],
            &["rental.inventory_id"],
            JoinType::Inner,
        )?
        .join(payment, &["rental.rental_id"], &["payment.rental_id"], JoinType::Inner)?;

    Ok(joined
        .group_by(&["category.category_id", "category.name"])
        .agg(&[col("payment.amount").sum().alias("sum_spend")])?
        .sort(&["sum_spend"], true)?
        .select(&[col("name"), col("sum_spend")])?
        .limit(1))
}

/// Films with no inventory row, as an anti-join. All film columns are kept.
pub fn films_not_in_inventory(film: &DataFrame, inventory: &DataFrame) -> PagilaResult<DataFrame> {
    film.join(inventory, &["film.film_id"], &["inventory.film_id"], JoinType::Anti)?
        .unqualified()
}

/// Actors ranked in the top three by number of "Children" films. Ties share a rank, so more
/// than three actors can come back.
pub fn top_children_actors(
    category: &DataFrame,
    film_category: &DataFrame,
    film: &DataFrame,
    actor: &DataFrame,
    film_actor: &DataFrame,
) -> PagilaResult<DataFrame> {
    let children = category
        .join(
            film_category,
            &["category.category_id"],
            &["film_category.category_id"],
            JoinType::Inner,
        )?
        .join(film, &["film_category.film_id"], &["film.film_id"], JoinType::Inner)?
        .join(film_actor, &["film.film_id"], &["film_actor.film_id"], JoinType::Inner)?
        .join(actor, &["film_actor.actor_id"], &["actor.actor_id"], JoinType::Inner)?
        .filter(&col("category.name").eq(lit("Children")))?;

    let ranked = children
        .group_by(&["actor.actor_id"])
        .agg(&[col("film.film_id").count().alias("film_count")])?
        .with_column(dense_rank(col("film_count"), true).alias("row_rank"))?
        .filter(&col("row_rank").lt_eq(lit(3)))?;

    ranked
        .join(actor, &["actor_id"], &["actor.actor_id"], JoinType::Inner)?
        .select(&[col("first_name"), col("last_name")])
}

/// Active and inactive customers per city, most inactive first.
///
/// The counts are window sums over `city_id`, deduplicated on the displayed row.
pub fn city_customer_activity(
    city: &DataFrame,
    address: &DataFrame,
    customer: &DataFrame,
) -> PagilaResult<DataFrame> {
    let count_where = |active: i64, name: &str| {
        when(col("customer.active").eq(lit(active)))
            .then(lit(1))
            .otherwise(lit(0))
            .sum()
            .over(&["city.city_id"])
            .alias(name)
    };

    city.join(address, &["city.city_id"], &["address.city_id"], JoinType::Inner)?
        .join(
            customer,
            &["address.address_id"],
            &["customer.address_id"],
            JoinType::Inner,
        )?
        .with_column(count_where(1, "active_customer"))?
        .with_column(count_where(0, "inactive_customer"))?
        .select(&[
            col("city.city"),
            col("active_customer"),
            col("inactive_customer"),
        ])?
        .distinct()?
        .sort(&["inactive_customer"], true)
}

/// The category with the most rental hours among customers of cities starting with `a`,
/// followed by the same for cities containing `-`.
///
/// Rental hours are the film's `rental_duration`, counted once per rental.
#[allow(clippy::too_many_arguments)]
pub fn top_rental_hours_by_city_pattern(
    category: &DataFrame,
    film_category: &DataFrame,
    film: &DataFrame,
    inventory: &DataFrame,
    rental: &DataFrame,
    customer: &DataFrame,
    city: &DataFrame,
    address: &DataFrame,
) -> PagilaResult<DataFrame> {
    let joined = category
        .join(
            film_category,
            &["category.category_id"],
            &["film_category.category_id"],
            JoinType::Inner,
        )?
        .join(film, &["film_category.film_id"], &["film.film_id"], JoinType::Inner)?
        .join(inventory, &["film.film_id"], &["inventory.film_id"], JoinType::Inner)?
        .join(
            rental,
            &["inventory.inventory_id"],
            &["rental.inventory_id"],
            JoinType::Inner,
        )?
        .join(
            customer,
            &["rental.customer_id"],
            &["customer.customer_id"],
            JoinType::Inner,
        )?
        .join(
            address,
            &["customer.address_id"],
            &["address.address_id"],
            JoinType::Inner,
        )?
        .join(city, &["address.city_id"], &["city.city_id"], JoinType::Inner)?;

    let hours_where = |pattern: &str, name: &str| {
        when(col("city.city").like(pattern))
            .then(col("film.rental_duration"))
            .otherwise(lit(0))
            .sum()
            .alias(name)
    };
    let rent = joined
        .group_by(&["category.name"])
        .agg(&[hours_where("a%", "rent_a"), hours_where("%-%", "rent_")])?;

    let top = |metric: &str| -> PagilaResult<DataFrame> {
        rent.sort(&[metric], true)?
            .limit(1)
            .select(&[col("name").alias("category_name"), col(metric).alias("rent")])
    };

    top("rent_a")?.union_all(&top("rent_")?)
}

/// The reports in the order they are run and printed.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum Report {
    FilmsPerCategory = 1,
    TopActorsByRentals = 2,
    TopSpendCategory = 3,
    FilmsNotInInventory = 4,
    TopChildrenActors = 5,
    CityCustomerActivity = 6,
    RentalHoursByCityPattern = 7,
}

impl Report {
    pub const ALL: [Report; 7] = [
        Report::FilmsPerCategory,
        Report::TopActorsByRentals,
        Report::TopSpendCategory,
        Report::FilmsNotInInventory,
        Report::TopChildrenActors,
        Report::CityCustomerActivity,
        Report::RentalHoursByCityPattern,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Report::FilmsPerCategory => "Number of films in each category",
            Report::TopActorsByRentals => "Top 10 actors by rental count",
            Report::TopSpendCategory => "Category with the highest total spend",
            Report::FilmsNotInInventory => "Films not in the inventory",
            Report::TopChildrenActors => "Top 3 actors in the \"Children\" category",
            Report::CityCustomerActivity => "Active and inactive customers per city",
            Report::RentalHoursByCityPattern => {
                "Category with the most rental hours in cities starting with \"a\" or containing \"-\""
            },
        }
    }

    /// How many rows the runner prints. `None` prints everything.
    pub fn display_limit(&self) -> Option<usize> {
        match self {
            Report::TopActorsByRentals => Some(10),
            Report::FilmsNotInInventory => Some(6),
            _ => None,
        }
    }

    pub fn run(&self, t: &Tables) -> PagilaResult<DataFrame> {
        match self {
            Report::FilmsPerCategory => films_per_category(&t.category, &t.film_category, &t.film),
            Report::TopActorsByRentals => {
                top_actors_by_rentals(&t.actor, &t.film_actor, &t.film, &t.inventory, &t.rental)
            },
            Report::TopSpendCategory => top_spend_category(
                &t.category,
                &t.film_category,
                &t.film,
                &t.inventory,
                &t.rental,
                &t.payment,
            ),
            Report::FilmsNotInInventory => films_not_in_inventory(&t.film, &t.inventory),
            Report::TopChildrenActors => top_children_actors(
                &t.category,
                &t.film_category,
                &t.film,
                &t.actor,
                &t.film_actor,
            ),
            Report::CityCustomerActivity => {
                city_customer_activity(&t.city, &t.address, &t.customer)
            },
            Report::RentalHoursByCityPattern => top_rental_hours_by_city_pattern(
                &t.category,
                &t.film_category,
                &t.film,
                &t.inventory,
                &t.rental,
                &t.customer,
                &t.city,
                &t.address,
            ),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "report {}: {}", u8::from(*self), self.title())
    }
}
