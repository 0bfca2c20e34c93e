//! Notification message rendering
//!
//! One message per event bucket: a cycle that finds both new listings and
//! price drops sends two separate mails.

use crate::domain::{ListingRecord, PriceDrop};

/// Rendered notification ready for a `Notifier`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub body: String,
}

pub fn new_listings(records: &[ListingRecord]) -> Message {
    let mut body = String::from("<h2>New Listings Found</h2>\n");
    for record in records {
        body.push_str("<p>");
        push_title(&mut body, record);
        push_line(&mut body, "Stock ID", &escape_html(&record.identity));
        push_line(&mut body, "Price", &escape_html(&record.price_label()));
        push_link(&mut body, record);
        push_image(&mut body, record);
        body.push_str("</p>\n");
    }

    Message {
        subject: format!("New listings ({})", records.len()),
        body,
    }
}

pub fn price_drops(drops: &[PriceDrop]) -> Message {
    let mut body = String::from("<h2>Price Drops Detected</h2>\n");
    for drop in drops {
        let record = &drop.record;
        body.push_str("<p>");
        push_title(&mut body, record);
        push_line(&mut body, "Stock ID", &escape_html(&record.identity));
        push_line(&mut body, "Old Price", &escape_html(&drop.old_price.to_string()));
        push_line(&mut body, "New Price", &escape_html(&drop.new_price.to_string()));
        push_link(&mut body, record);
        push_image(&mut body, record);
        body.push_str("</p>\n");
    }

    Message {
        subject: format!("Price drops ({})", drops.len()),
        body,
    }
}

fn push_title(body: &mut String, record: &ListingRecord) {
    if let Some(title) = record.title.as_deref().filter(|t| !t.trim().is_empty()) {
        body.push_str(&format!("<b>{}</b><br>", escape_html(title)));
    }
}

fn push_line(body: &mut String, label: &str, value: &str) {
    body.push_str(&format!("<b>{label}:</b> {value}<br>"));
}

fn push_link(body: &mut String, record: &ListingRecord) {
    let href = escape_html(record.locator.as_str());
    body.push_str(&format!("<b>Link:</b> <a href=\"{href}\">{href}</a><br>"));
}

fn push_image(body: &mut String, record: &ListingRecord) {
    if record.media_reference.is_empty() {
        return;
    }
    body.push_str(&format!(
        "<img src=\"{}\" style=\"max-width:400px;height:auto;display:block;\" alt=\"listing image\"><br>",
        escape_html(&record.media_reference)
    ));
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
