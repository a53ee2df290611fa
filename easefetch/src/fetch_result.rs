use crate::FetchError;

/// Conversion from whatever a fetch future resolves to into the two-variant
/// outcome the controller works with.
pub trait IntoFetchResult<T> {
    fn into_fetch_result(self) -> Result<T, FetchError>;
}

impl<T, E> IntoFetchResult<T> for Result<T, E>
where
    E: Into<FetchError>,
{
    fn into_fetch_result(self) -> Result<T, FetchError> {
        self.map_err(Into::into)
    }
}

impl<T> IntoFetchResult<T> for Option<T> {
    fn into_fetch_result(self) -> Result<T, FetchError> {
        self.ok_or_else(|| FetchError::new("Operation returned None!"))
    }
}
