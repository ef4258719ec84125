pub(crate) mod date;
pub(crate) mod logging;

pub(crate) use date::{days_of_month, parse_day, parse_month, validate_identifier};
pub(crate) use logging::init_logging;
