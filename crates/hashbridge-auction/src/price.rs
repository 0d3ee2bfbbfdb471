//! Dutch Auction price-decay formula, computed entirely in
//! integer ratio arithmetic — the same treatment `chronx_timelock::schedule`
//! gives its treasury-release amounts (`numerator / (H100_SCALED * k)`),
//! generalized here from a one-shot schedule table to a continuous
//! per-order linear interpolation between two `Price` ratios.

use hashbridge_core::types::{Price, Timestamp};

fn gcd(a: u128, b: u128) -> u128 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn reduce(num: u128, den: u128) -> Price {
    if num == 0 {
        return Price::new(0, 1);
    }
    let g = gcd(num, den).max(1);
    Price::new(num / g, den / g)
}

fn sub(a: Price, b: Price) -> Price {
    let num = a.num.saturating_mul(b.den).saturating_sub(b.num.saturating_mul(a.den));
    let den = a.den.saturating_mul(b.den);
    reduce(num, den)
}

fn add(a: Price, b: Price) -> Price {
    let num = a.num.saturating_mul(b.den).saturating_add(b.num.saturating_mul(a.den));
    let den = a.den.saturating_mul(b.den);
    reduce(num, den)
}

fn scale(p: Price, frac_num: u128, frac_den: u128) -> Price {
    let num = p.num.saturating_mul(frac_num);
    let den = p.den.saturating_mul(frac_den);
    reduce(num, den)
}

/// `current_price(t) = reserve + (opening - reserve) * max(0, (end - t) / (end - start))`.
///
/// Clamps to `opening` before `auction_start_time` and to `reserve` at or
/// after `auction_end_time` — the formula's `max(0, ...)` term plus the
/// invariant that price never decays below reserve.
pub fn current_price(
    opening: Price,
    reserve: Price,
    auction_start: Timestamp,
    auction_end: Timestamp,
    now: Timestamp,
) -> Price {
    if now <= auction_start {
        return opening;
    }
    if now >= auction_end {
        return reserve;
    }
    let elapsed_from_end = (auction_end - now) as u128;
    let window = (auction_end - auction_start) as u128;
    let decayed_premium = scale(sub(opening, reserve), elapsed_from_end, window);
    add(reserve, decayed_premium)
}

/// Opening price is `reserve_price` marked up by a fixed premium ratio,
/// favorable to the resolver; the exact markup is a deployment parameter
/// rather than a per-order field.
pub fn opening_price(reserve: Price, premium: Price) -> Price {
    Price::new(
        reserve.num.saturating_mul(premium.num),
        reserve.den.saturating_mul(premium.den),
    )
}
