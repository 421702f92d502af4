use crate::db::Album;

/// Ten-glyph star scale followed by `(n/10)`.
pub fn rating_stars(rating: u8) -> String {
    let filled = rating.min(10) as usize;
    format!("{}{} ({}/10)", "★".repeat(filled), "☆".repeat(10 - filled), rating)
}

fn push_field(out: &mut Vec<String>, label: &str, value: &Option<String>) {
    if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
        out.push(format!("{}: {}", label, v));
    }
}

fn push_list(out: &mut Vec<String>, label: &str, values: &[String]) {
    if !values.is_empty() {
        out.push(format!("{}: {}", label, values.join(", ")));
    }
}

/// Human-readable block for the terminal. `detailed` adds every enrichment field.
pub fn format_for_display(album: &Album, detailed: bool) -> String {
    let mut out = vec![
        format!("ID: {}", album.id),
        format!("Album: {}", album.album_name),
        format!("Artists: {}", album.artists.join(", ")),
    ];

    push_field(&mut out, "Genre", &album.genre);
    if let Some(rating) = album.rating {
        out.push(format!("Rating: {}", rating_stars(rating)));
    }

    if detailed {
        push_field(&mut out, "Release Date", &album.release_date);
        push_field(&mut out, "Label", &album.label);
        push_field(&mut out, "Producer", &album.producer);
        push_field(&mut out, "Duration", &album.total_duration);
        if let Some(count) = album.track_count {
            out.push(format!("Track Count: {}", count));
        }
        if !album.track_listing.is_empty() {
            out.push("Track Listing:".to_string());
            for (i, track) in album.track_listing.iter().enumerate() {
                out.push(format!("  {}. {}", i + 1, track));
            }
        }
        push_field(&mut out, "Review", &album.album_review);
        push_field(&mut out, "Musical Style", &album.musical_style);
        push_list(&mut out, "Similar Artists", &album.similar_artists);
        push_list(&mut out, "Awards", &album.awards);
        push_list(&mut out, "Categories", &album.llm_categories);
        push_list(&mut out, "User Categories", &album.user_categories);
        push_field(&mut out, "Notes", &album.personal_notes);
        push_field(&mut out, "Source Image", &album.source_image_path);
        out.push(format!("Date Added: {}", album.date_added));
        out.push(format!("Last Updated: {}", album.last_updated));
    }

    out.join("\n")
}
