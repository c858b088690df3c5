use chrono::{DateTime, Local, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

const ETH_DISPLAY_DP: u32 = 4;
const USD_DISPLAY_DP: u32 = 2;

fn round_for_display(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

pub fn format_eth(value: Decimal) -> String {
    format!(
        "{:.prec$}",
        round_for_display(value, ETH_DISPLAY_DP),
        prec = ETH_DISPLAY_DP as usize
    )
}

/// `$1,234.56`
pub fn format_usd(value: Decimal) -> String {
    let plain = format!(
        "{:.prec$}",
        round_for_display(value, USD_DISPLAY_DP).abs(),
        prec = USD_DISPLAY_DP as usize
    );
    let (whole, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value.is_sign_negative() && !round_for_display(value, USD_DISPLAY_DP).is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${grouped}.{fraction}")
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    format_timestamp_in(timestamp, &Local)
}

fn format_timestamp_in<Tz: TimeZone>(timestamp: DateTime<Utc>, zone: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    timestamp
        .with_timezone(zone)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}
