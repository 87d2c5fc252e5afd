//! Archive page extraction
//!
//! Turns show and playlist page markup into raw records. A malformed entry is
//! dropped with a warning; its siblings on the same page are still returned.

use super::{ArchiveError, RawPlaylist, RawSpin, ShowPage};
use chrono::{NaiveDateTime, NaiveTime};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

const TIMESLOT_FORMAT: &str = "%b %d, %Y %I:%M %p";
const SPIN_TIME_FORMAT: &str = "%I:%M %p";

fn selector(css: &str) -> Result<Selector, ArchiveError> {
    Selector::parse(css).map_err(|e| ArchiveError::Parse(format!("Invalid selector {}: {:?}", css, e)))
}

/// Concatenated, trimmed text of the first match below `element`
fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
}

/// Parse a show page into its playlists and the next page number
///
/// A page without the playlist list at all is a parse error, since the walk
/// cannot tell where it is.
pub fn parse_show_page(markup: &str) -> Result<ShowPage, ArchiveError> {
    let list_selector = selector("div#playlist-list-0")?;
    let item_selector = selector("div.list-item")?;
    let pager_selector = selector("div.infpager.infpager_next")?;
    let timeslot_selector = selector("p.timeslot")?;
    let name_selector = selector("h4.episode-name")?;
    let description_selector = selector("div.episode-description")?;

    let document = Html::parse_document(markup);
    let list = document
        .select(&list_selector)
        .next()
        .ok_or_else(|| ArchiveError::Parse("Show page has no playlist list".to_string()))?;

    let mut items = Vec::new();
    for element in list.select(&item_selector) {
        let external_id = match element.value().attr("data-key").map(str::trim) {
            Some(key) => match key.parse::<i64>() {
                Ok(id) => id,
                Err(e) => {
                    warn!(key, error = %e, "Dropping playlist entry with invalid key");
                    continue;
                }
            },
            None => {
                warn!("Dropping playlist entry without key");
                continue;
            }
        };

        let timeslot = match first_text(element, &timeslot_selector) {
            Some(text) => match parse_timeslot(&text) {
                Ok(timeslot) => timeslot,
                Err(e) => {
                    warn!(external_id, error = %e, "Dropping playlist entry with bad timeslot");
                    continue;
                }
            },
            None => {
                warn!(external_id, "Dropping playlist entry without timeslot");
                continue;
            }
        };

        items.push(RawPlaylist {
            external_id,
            timeslot,
            title: first_text(element, &name_selector).unwrap_or_default(),
            description: first_text(element, &description_selector).filter(|d| !d.is_empty()),
        });
    }

    let next_page = match list.select(&pager_selector).next() {
        Some(pager) => next_page_number(pager)?,
        None => None,
    };

    debug!(items = items.len(), ?next_page, "Parsed show page");

    Ok(ShowPage { items, next_page })
}

/// Next page from the pager element
///
/// The pager's current page is zero-based while requests are one-based, so
/// the following page is `current + 2`.
fn next_page_number(pager: ElementRef<'_>) -> Result<Option<u32>, ArchiveError> {
    if pager.value().attr("data-has-more").map(str::trim) != Some("1") {
        return Ok(None);
    }

    let current = pager
        .value()
        .attr("data-current-page")
        .ok_or_else(|| ArchiveError::Parse("Pager without current page".to_string()))?;

    let current: u32 = current
        .trim()
        .parse()
        .map_err(|e| ArchiveError::Parse(format!("Invalid current page {:?}: {}", current, e)))?;

    Ok(Some(current + 2))
}

/// Parse a timeslot such as `Jan 6, 2024 8:00 PM\u{a0}- 10:00 PM`
///
/// Only the start, up to the first non-breaking space, is significant.
pub fn parse_timeslot(text: &str) -> Result<NaiveDateTime, ArchiveError> {
    let start = text.split('\u{a0}').next().unwrap_or_default().trim();
    NaiveDateTime::parse_from_str(start, TIMESLOT_FORMAT)
        .map_err(|e| ArchiveError::Parse(format!("Invalid timeslot {:?}: {}", start, e)))
}

/// Parse a playlist page into its spins in airing order
///
/// A page without any spin table yields no spins.
pub fn parse_playlist_page(markup: &str) -> Result<Vec<RawSpin>, ArchiveError> {
    let table_selector = selector("div#public-spins-0")?;
    let row_selector = selector("tr.spin-item")?;
    let artist_selector = selector("span.artist")?;
    let song_selector = selector("span.song")?;
    let release_selector = selector("span.release")?;
    let released_selector = selector("span.released")?;
    let time_selector = selector("td.spin-time a")?;

    let document = Html::parse_document(markup);
    let Some(table) = document.select(&table_selector).next() else {
        debug!("Playlist page has no spin table");
        return Ok(Vec::new());
    };

    let mut spins = Vec::new();
    for row in table.select(&row_selector) {
        let Some(external_id) = row
            .value()
            .attr("data-key")
            .and_then(|key| key.trim().parse::<i64>().ok())
        else {
            warn!("Dropping spin without a valid key");
            continue;
        };

        let (Some(artist), Some(title)) = (
            first_text(row, &artist_selector),
            first_text(row, &song_selector),
        ) else {
            warn!(external_id, "Dropping spin without artist or title");
            continue;
        };

        let start_time = match first_text(row, &time_selector)
            .map(|t| NaiveTime::parse_from_str(&t, SPIN_TIME_FORMAT))
        {
            Some(Ok(time)) => time,
            Some(Err(e)) => {
                warn!(external_id, error = %e, "Dropping spin with bad start time");
                continue;
            }
            None => {
                warn!(external_id, "Dropping spin without start time");
                continue;
            }
        };

        let year = match first_text(row, &released_selector) {
            Some(text) => match text.parse::<i32>() {
                Ok(year) => Some(year),
                Err(_) => {
                    warn!(external_id, text = %text, "Spin has unparseable release year");
                    None
                }
            },
            None => {
                warn!(external_id, "Spin has no release year");
                None
            }
        };

        let album = first_text(row, &release_selector).filter(|a| !a.is_empty());
        if album.is_none() {
            warn!(external_id, "Spin has no album");
        }

        spins.push(RawSpin {
            external_id,
            artist,
            title,
            album,
            year,
            start_time,
        });
    }

    Ok(spins)
}
