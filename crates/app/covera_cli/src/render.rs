//! Plain-text rendering of a portfolio.

use std::fmt::Write;

use covera_core::view::{PackageView, Portfolio};

pub fn portfolio(portfolio: &Portfolio) -> String {
    let mut out = String::new();

    if portfolio.packages.is_empty() {
        out.push_str("No packages.\n");
    }
    for package in &portfolio.packages {
        package_block(&mut out, package);
    }

    if !portfolio.standalone_policies.is_empty() {
        out.push_str("\nStandalone policies\n");
        for policy in &portfolio.standalone_policies {
            let _ = writeln!(
                out,
                "  {:<12} {:<32} {:>10.2}  {}",
                policy.application.application.id,
                policy.application.title,
                policy.application.application.amount,
                policy.application.display_status.label,
            );
        }
    }

    let _ = writeln!(out, "\nTotal due: {:.2}", portfolio.total_due());
    out
}

fn package_block(out: &mut String, package: &PackageView) {
    let _ = writeln!(
        out,
        "{} [{}] {}",
        package.id, package.display_status.label, package.name
    );
    if let Some(error) = &package.detail_error {
        let _ = writeln!(out, "  ! details unavailable: {error}");
    }
    for app in &package.applications {
        let _ = writeln!(
            out,
            "  - {:<32} {:<20} {:>10.2}",
            app.title, app.category_label, app.application.amount
        );
    }
    let _ = writeln!(
        out,
        "  total {:.2}, discount {}%, due {:.2}",
        package.total_amount, package.discount, package.discounted_amount
    );

    let mut actions = Vec::new();
    if package.can_pay {
        actions.push("pay");
    }
    if package.can_continue_setup {
        actions.push("continue setup");
    }
    if package.can_cancel {
        actions.push("cancel");
    }
    let _ = writeln!(out, "  actions: {}", actions.join(", "));
}
