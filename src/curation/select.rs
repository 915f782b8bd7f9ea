//! Cutting sequences down: first/last/random N and duration budgets.
//!
//! `keep_*` functions work in place, `slice_*` return a new vector and
//! leave the input alone.

use chrono::{Datelike, Local, NaiveDate, Weekday};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::catalog::Track;

pub fn slice_first<T: Clone>(items: &[T], count: usize) -> Vec<T> {
    items[..count.min(items.len())].to_vec()
}

pub fn slice_last<T: Clone>(items: &[T], count: usize) -> Vec<T> {
    items[items.len().saturating_sub(count)..].to_vec()
}

pub fn slice_all_except_first<T: Clone>(items: &[T], skip: usize) -> Vec<T> {
    items[skip.min(items.len())..].to_vec()
}

pub fn slice_all_except_last<T: Clone>(items: &[T], skip: usize) -> Vec<T> {
    items[..items.len().saturating_sub(skip)].to_vec()
}

pub fn keep_first<T>(items: &mut Vec<T>, count: usize) {
    items.truncate(count);
}

pub fn keep_last<T>(items: &mut Vec<T>, count: usize) {
    let start = items.len().saturating_sub(count);
    items.drain(..start);
}

pub fn keep_all_except_first<T>(items: &mut Vec<T>, skip: usize) {
    let end = skip.min(items.len());
    items.drain(..end);
}

pub fn keep_all_except_last<T>(items: &mut Vec<T>, skip: usize) {
    let len = items.len().saturating_sub(skip);
    items.truncate(len);
}

/// Shuffles the whole sequence, then keeps the first `count`.
/// A count of zero keeps everything in its original order.
pub fn keep_random<T>(items: &mut Vec<T>, count: usize) {
    keep_random_with(items, count, &mut rand::rng());
}

pub fn keep_random_with<T, R: Rng + ?Sized>(items: &mut Vec<T>, count: usize, rng: &mut R) {
    if count == 0 {
        return;
    }
    items.shuffle(rng);
    items.truncate(count);
}

pub fn slice_random<T: Clone>(items: &[T], count: usize) -> Vec<T> {
    let mut copy = items.to_vec();
    keep_random(&mut copy, count);
    copy
}

/// Greedy fill up to `minutes` of playback. A track that would overflow
/// the budget is skipped and later, shorter tracks may still fit.
pub fn slice_no_longer_than(tracks: &[Track], minutes: u64) -> Vec<Track> {
    let budget = minutes.saturating_mul(60 * 1000);
    let mut total = 0u64;
    tracks
        .iter()
        .filter(|track| {
            let next = total.saturating_add(track.duration_ms);
            if next <= budget {
                total = next;
                true
            } else {
                false
            }
        })
        .cloned()
        .collect()
}

pub fn keep_no_longer_than(tracks: &mut Vec<Track>, minutes: u64) {
    *tracks = slice_no_longer_than(tracks, minutes);
}

pub fn is_weekend() -> bool {
    is_weekend_on(Local::now().date_naive())
}

pub fn is_weekend_on(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// `day` is an English weekday name, full or abbreviated, any case.
pub fn is_day_of_week(day: &str) -> bool {
    is_day_of_week_on(day, Local::now().date_naive())
}

pub fn is_day_of_week_on(day: &str, date: NaiveDate) -> bool {
    match day.trim().parse::<Weekday>() {
        Ok(weekday) => weekday == date.weekday(),
        Err(_) => {
            log::warn!("Unknown weekday name '{}'", day);
            false
        }
    }
}
