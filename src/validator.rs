use crate::errors::ServiceError;
use serde::de::DeserializeOwned;

/// Wrapper around client input that has to pass a [`Validate`]
/// check before the inner value can be taken out.
#[derive(Deserialize)]
pub struct Validator<T>(T);

pub trait Validate<T> {
    fn validate(&self) -> Result<(), ServiceError>;
}

impl<T> Validator<T> {
    #[allow(dead_code)]
    pub fn new(i: T) -> Validator<T> {
        Validator::<T>(i)
    }
}

impl<T> Validator<T>
where
    T: Validate<T>,
    T: DeserializeOwned,
{
    /// Run the validation, handing back the inner value on success.
    pub fn validate(self) -> Result<T, ServiceError> {
        self.0.validate()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rating(i16);

    impl Validate<Rating> for Rating {
        fn validate(&self) -> Result<(), ServiceError> {
            if (1..=5).contains(&self.0) {
                return Ok(());
            }
            Err(ServiceError::BadRequest("invalid rating".to_string()))
        }
    }

    #[test]
    fn out_of_range_rating() {
        assert!(Rating(0).validate().is_err());
        assert!(Rating(6).validate().is_err());
    }

    #[test]
    fn rating_within_range() {
        assert!(Rating(1).validate().is_ok());
        assert!(Rating(5).validate().is_ok());
    }
}
