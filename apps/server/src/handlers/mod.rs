pub(crate) mod casts;
pub(crate) mod health;
pub(crate) mod spa;
pub(crate) mod uploads;
pub(crate) mod users;
