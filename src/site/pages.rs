//! HTML page bodies. Every function here is pure: albums in, markup out.

use std::collections::HashMap;

use super::{genre_color, genre_key, group_albums, html_escape, release_year, Group};
use crate::catalog::rating_stars;
use crate::db::Album;

pub const STYLE_CSS: &str = r#"body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    max-width: 1200px;
    margin: 0 auto;
    padding: 20px;
    background: #1a1a1a;
    color: #e0e0e0;
}
a { color: #4fc3f7; text-decoration: none; }
a:hover { text-decoration: underline; }
nav { margin-bottom: 20px; }
nav a { margin-right: 16px; }
h1 {
    color: #4fc3f7;
    border-bottom: 2px solid #4fc3f7;
    padding-bottom: 10px;
}
h2 { color: #81c784; margin-top: 32px; }
.stats {
    display: grid;
    grid-template-columns: repeat(auto-fill, minmax(180px, 1fr));
    gap: 16px;
    margin-bottom: 24px;
}
.stat {
    background: #2d2d2d;
    border-radius: 8px;
    padding: 15px;
    display: flex;
    flex-direction: column;
}
.stat-value { font-size: 28px; color: #fff; }
.stat-label { color: #888; font-size: 13px; }
.album-grid {
    display: grid;
    grid-template-columns: repeat(auto-fill, minmax(260px, 1fr));
    gap: 16px;
}
.album-card {
    background: #2d2d2d;
    border-radius: 8px;
    padding: 15px;
    border: 1px solid #404040;
}
.album-card h3 { margin: 0 0 6px 0; font-size: 16px; }
.artists { color: #b0b0b0; font-size: 14px; }
.badge {
    display: inline-block;
    padding: 2px 8px;
    border-radius: 10px;
    font-size: 12px;
    color: #111;
    margin-top: 8px;
}
.rating { color: #ffd54f; font-size: 13px; margin-top: 6px; }
.tag {
    display: inline-block;
    background: #404040;
    border-radius: 4px;
    padding: 2px 6px;
    margin: 2px;
    font-size: 12px;
}
dl.details dt { color: #888; margin-top: 10px; }
dl.details dd { margin-left: 0; }
.review { font-style: italic; color: #b0b0b0; }
"#;

fn layout(site_title: &str, page_title: &str, root: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{page} - {site}</title>
    <link rel="stylesheet" href="{root}style.css">
</head>
<body>
    <nav>
        <a href="{root}index.html">Dashboard</a>
        <a href="{root}albums/index.html">Albums</a>
        <a href="{root}artists.html">Artists</a>
        <a href="{root}genres.html">Genres</a>
        <a href="{root}years.html">Years</a>
        <a href="{root}categories.html">Categories</a>
    </nav>
    <h1>{page}</h1>
{body}
</body>
</html>
"#,
        page = html_escape(page_title),
        site = html_escape(site_title),
        root = root,
        body = body
    )
}

fn genre_badge(genre: &Option<String>) -> String {
    match genre.as_deref().filter(|g| !g.trim().is_empty()) {
        Some(g) => format!(
            r#"<span class="badge" style="background: {}">{}</span>"#,
            genre_color(g),
            html_escape(g)
        ),
        None => String::new(),
    }
}

fn album_card(album: &Album, root: &str) -> String {
    let rating = album
        .rating
        .map(|r| format!(r#"<div class="rating">{}</div>"#, rating_stars(r)))
        .unwrap_or_default();

    format!(
        r#"        <div class="album-card">
            <h3><a href="{root}albums/{id}.html">{name}</a></h3>
            <div class="artists">{artists}</div>
            {badge}
            {rating}
        </div>
"#,
        root = root,
        id = album.id,
        name = html_escape(&album.album_name),
        artists = html_escape(&album.artists.join(", ")),
        badge = genre_badge(&album.genre),
        rating = rating
    )
}

fn album_grid(albums: &[&Album], root: &str) -> String {
    let mut html = String::from("    <div class=\"album-grid\">\n");
    for album in albums {
        html.push_str(&album_card(album, root));
    }
    html.push_str("    </div>\n");
    html
}

fn grouped_page(groups: &[Group<'_>], root: &str) -> String {
    let mut body = String::new();
    if groups.is_empty() {
        body.push_str("    <p>No albums yet.</p>\n");
    }
    for group in groups {
        body.push_str(&format!(
            "    <h2>{} <small>({})</small></h2>\n",
            html_escape(&group.name),
            group.albums.len()
        ));
        body.push_str(&album_grid(&group.albums, root));
    }
    body
}

/// Collection summary numbers shown on the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub total_albums: usize,
    pub artists: usize,
    pub average_rating: Option<f64>,
    pub top_genre: Option<String>,
}

impl DashboardStats {
    pub fn compute(albums: &[Album]) -> Self {
        let mut artists: Vec<String> = albums
            .iter()
            .flat_map(|a| a.artists.iter().map(|n| n.trim().to_lowercase()))
            .collect();
        artists.sort();
        artists.dedup();

        let ratings: Vec<f64> = albums.iter().filter_map(|a| a.rating).map(f64::from).collect();
        let average_rating = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
        };

        // Keyed on the normalized genre, shown with the first spelling seen
        let mut genre_counts: HashMap<String, (&str, usize)> = HashMap::new();
        for genre in albums.iter().filter_map(|a| a.genre.as_deref()) {
            let entry = genre_counts.entry(genre_key(genre)).or_insert((genre.trim(), 0));
            entry.1 += 1;
        }
        // Most albums wins, ties go to the alphabetically first genre
        let top_genre = genre_counts
            .into_iter()
            .max_by(|(ka, (_, ca)), (kb, (_, cb))| ca.cmp(cb).then_with(|| kb.cmp(ka)))
            .map(|(_, (display, _))| display.to_string());

        Self {
            total_albums: albums.len(),
            artists: artists.len(),
            average_rating,
            top_genre,
        }
    }
}

fn stat(value: &str, label: &str) -> String {
    format!(
        r#"        <div class="stat"><span class="stat-value">{}</span><span class="stat-label">{}</span></div>
"#,
        html_escape(value),
        label
    )
}

pub fn dashboard(site_title: &str, albums: &[Album]) -> String {
    let stats = DashboardStats::compute(albums);

    let mut body = String::from("    <div class=\"stats\">\n");
    body.push_str(&stat(&stats.total_albums.to_string(), "Total Albums"));
    body.push_str(&stat(&stats.artists.to_string(), "Artists"));
    body.push_str(&stat(
        &stats
            .average_rating
            .map(|r| format!("{:.1}", r))
            .unwrap_or_else(|| "n/a".to_string()),
        "Average Rating",
    ));
    body.push_str(&stat(
        stats.top_genre.as_deref().unwrap_or("n/a"),
        "Top Genre",
    ));
    body.push_str("    </div>\n");

    let mut recent: Vec<&Album> = albums.iter().collect();
    recent.sort_by(|a, b| b.date_added.cmp(&a.date_added).then(b.id.cmp(&a.id)));
    recent.truncate(8);

    body.push_str("    <h2>Recently Added</h2>\n");
    body.push_str(&album_grid(&recent, ""));

    layout(site_title, site_title, "", &body)
}

pub fn album_index(site_title: &str, albums: &[Album]) -> String {
    let mut sorted: Vec<&Album> = albums.iter().collect();
    sorted.sort_by(|a, b| {
        a.album_name
            .to_lowercase()
            .cmp(&b.album_name.to_lowercase())
            .then(a.id.cmp(&b.id))
    });
    layout(site_title, "All Albums", "../", &album_grid(&sorted, "../"))
}

fn detail_row(label: &str, value: &str) -> String {
    format!(
        "        <dt>{}</dt><dd>{}</dd>\n",
        label,
        html_escape(value)
    )
}

fn tag_row(label: &str, values: &[String]) -> String {
    let tags: String = values
        .iter()
        .map(|v| format!(r#"<span class="tag">{}</span>"#, html_escape(v)))
        .collect();
    format!("        <dt>{}</dt><dd>{}</dd>\n", label, tags)
}

pub fn album_page(site_title: &str, album: &Album) -> String {
    let mut body = format!(
        "    <div class=\"artists\">{}</div>\n    {}\n",
        html_escape(&album.artists.join(", ")),
        genre_badge(&album.genre)
    );
    if let Some(r) = album.rating {
        body.push_str(&format!("    <div class=\"rating\">{}</div>\n", rating_stars(r)));
    }

    body.push_str("    <dl class=\"details\">\n");
    let text_fields = [
        ("Release Date", &album.release_date),
        ("Label", &album.label),
        ("Producer", &album.producer),
        ("Duration", &album.total_duration),
        ("Musical Style", &album.musical_style),
    ];
    for (label, value) in text_fields {
        if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            body.push_str(&detail_row(label, v));
        }
    }
    if let Some(count) = album.track_count {
        body.push_str(&detail_row("Tracks", &count.to_string()));
    }
    if !album.track_listing.is_empty() {
        let items: String = album
            .track_listing
            .iter()
            .map(|t| format!("<li>{}</li>", html_escape(t)))
            .collect();
        body.push_str(&format!(
            "        <dt>Track Listing</dt><dd><ol>{}</ol></dd>\n",
            items
        ));
    }
    let list_fields = [
        ("Similar Artists", &album.similar_artists),
        ("Awards", &album.awards),
        ("Categories", &album.llm_categories),
        ("My Categories", &album.user_categories),
    ];
    for (label, values) in list_fields {
        if !values.is_empty() {
            body.push_str(&tag_row(label, values));
        }
    }
    if let Some(notes) = album.personal_notes.as_deref().filter(|n| !n.trim().is_empty()) {
        body.push_str(&detail_row("Notes", notes));
    }
    body.push_str(&detail_row("Added", &album.date_added));
    body.push_str("    </dl>\n");

    if let Some(review) = album.album_review.as_deref().filter(|r| !r.trim().is_empty()) {
        body.push_str(&format!(
            "    <h2>Review</h2>\n    <p class=\"review\">{}</p>\n",
            html_escape(review)
        ));
    }

    layout(site_title, &album.album_name, "../", &body)
}

pub fn artists_page(site_title: &str, albums: &[Album]) -> String {
    let groups = group_albums(albums, |a| a.artists.clone());
    layout(site_title, "Artists", "", &grouped_page(&groups, ""))
}

pub fn genres_page(site_title: &str, albums: &[Album]) -> String {
    let mut groups = group_albums(albums, |a| {
        vec![a
            .genre
            .clone()
            .filter(|g| !g.trim().is_empty())
            .unwrap_or_else(|| super::UNKNOWN.to_string())]
    });
    super::move_unknown_last(&mut groups);
    layout(site_title, "Genres", "", &grouped_page(&groups, ""))
}

pub fn years_page(site_title: &str, albums: &[Album]) -> String {
    let mut groups = group_albums(albums, |a| {
        vec![release_year(a.release_date.as_deref())
            .map(|y| y.to_string())
            .unwrap_or_else(|| super::UNKNOWN.to_string())]
    });
    // Newest first; the Unknown bucket sorts last
    groups.sort_by(|a, b| b.name.cmp(&a.name));
    super::move_unknown_last(&mut groups);
    layout(site_title, "Years", "", &grouped_page(&groups, ""))
}

pub fn categories_page(site_title: &str, albums: &[Album]) -> String {
    let groups = group_albums(albums, |a| {
        let mut merged: Vec<String> = Vec::new();
        for category in a.llm_categories.iter().chain(a.user_categories.iter()) {
            if !merged.contains(category) {
                merged.push(category.clone());
            }
        }
        merged
    });
    layout(site_title, "Categories", "", &grouped_page(&groups, ""))
}
