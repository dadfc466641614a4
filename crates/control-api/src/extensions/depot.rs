//! Depot helper extensions.

use std::any::Any;

use salvo::Depot;

use crate::errors::ApiError;

const CURRENT_USER_KEY: &str = "current_user";

/// The authenticated caller, resolved by the auth middleware.
#[derive(Debug, Clone)]
pub(crate) struct CurrentUser {
    pub id: i64,
    pub email: String,
}

/// Helpers for mapping depot extraction failures to HTTP errors.
pub(crate) trait DepotExt {
    fn obtain_or_500<T: Any + Send + Sync>(&self) -> Result<&T, ApiError>;
    fn current_user_or_401(&self) -> Result<CurrentUser, ApiError>;
    fn insert_current_user(&mut self, user: CurrentUser);
}

impl DepotExt for Depot {
    fn obtain_or_500<T: Any + Send + Sync>(&self) -> Result<&T, ApiError> {
        self.obtain::<T>().map_err(|_ignored| ApiError::internal())
    }

    fn current_user_or_401(&self) -> Result<CurrentUser, ApiError> {
        self.get::<CurrentUser>(CURRENT_USER_KEY)
            .ok()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }

    fn insert_current_user(&mut self, user: CurrentUser) {
        self.insert(CURRENT_USER_KEY, user);
    }
}
