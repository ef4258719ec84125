mod format;
mod json;
mod table;

pub(crate) use json::{
    output_days_json, output_hourly_json, output_monthly_json, output_paths_json,
    output_session_json,
};
pub(crate) use table::{
    TableOptions, print_days, print_hourly_table, print_monthly_table, print_paths,
    print_session_summary,
};
