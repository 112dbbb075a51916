//! `rangelite report-name <domain>` – navigation URL and report file name.

use rangelite_core::audit::{navigation_target, navigation_url, report_file_name};

pub fn run_report_name(domain: &str) {
    let target = navigation_target(domain);
    println!("{}", navigation_url(&target));
    println!("{}", report_file_name(&target));
}
