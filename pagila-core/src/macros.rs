/// Builds a [`crate::dataframe::DataFrame`] from literal columns.
///
/// ```text
/// let films = df! {
///     "film.film_id" => vec![1i64, 2],
///     "film.title" => vec!["ACADEMY DINOSAUR", "ACE GOLDFINGER"],
/// }?;
/// ```
#[macro_export]
macro_rules! df {
    ($($name:expr => $values:expr),+ $(,)?) => {{
        let columns: $crate::PagilaResult<::std::vec::Vec<_>> = ::std::vec![
            $(
                $crate::dataframe::IntoArrayRef::into_array_ref($values)
                    .map(|array| ($name.to_string(), array)),
            )+
        ]
        .into_iter()
        .collect();
        columns.and_then($crate::dataframe::DataFrame::from_columns)
    }};
}
