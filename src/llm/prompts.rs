//! Prompt text and image preparation shared by every vendor.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::GenericImageView;
use std::io::Cursor;

use super::EnrichmentRequest;
use crate::db::EnrichField;
use crate::error::ProviderError;

/// Longest side sent to a vision model
pub const MAX_IMAGE_DIMENSION: u32 = 1024;

pub fn extraction_prompt() -> &'static str {
    "Look at this image of album covers and identify every album visible. \
     Return ONLY a JSON array in this exact format, with no other text:\n\
     [{\"album_name\": \"Album Title\", \"artists\": [\"Artist Name\"]}, ...]\n\n\
     List every performing artist credited on each cover. \
     Skip any album whose title or artist cannot be read clearly; \
     if none can be read, return []."
}

fn field_description(field: EnrichField) -> &'static str {
    match field {
        EnrichField::ReleaseDate => "release_date (YYYY-MM-DD, or just the year if the day is unknown)",
        EnrichField::Label => "label (record label)",
        EnrichField::Producer => "producer (one or more names as a single string)",
        EnrichField::TotalDuration => "total_duration (e.g. \"42:17\")",
        EnrichField::TrackCount => "track_count (integer)",
        EnrichField::TrackListing => "track_listing (list of track titles in order)",
        EnrichField::AlbumReview => "album_review (two or three sentences)",
        EnrichField::MusicalStyle => "musical_style (short description of the sound)",
        EnrichField::SimilarArtists => "similar_artists (list of artist names)",
        EnrichField::Awards => "awards (list of notable awards or certifications)",
        EnrichField::LlmCategories => {
            "categories (list of descriptive tags such as \"concept album\", \"live recording\", \"debut album\")"
        }
        EnrichField::UserCategories => {
            "matched_categories (list chosen ONLY from the allowed categories below)"
        }
    }
}

/// Build the enrichment prompt for the fields still absent in `request.existing`.
pub fn enrichment_prompt(request: &EnrichmentRequest<'_>) -> String {
    let with_vocabulary = !request.vocabulary.is_empty();
    let fields = request.existing.missing_fields(with_vocabulary);

    let mut prompt = format!(
        "Provide information about the album \"{}\" by {}.\n\n\
         Return ONLY a JSON object with these keys:\n",
        request.album_name,
        request.artists.join(", ")
    );
    for field in &fields {
        prompt.push_str("- ");
        prompt.push_str(field_description(*field));
        prompt.push('\n');
    }

    if with_vocabulary && fields.contains(&EnrichField::UserCategories) {
        prompt.push_str("\nAllowed categories for matched_categories: ");
        prompt.push_str(&request.vocabulary.join(", "));
        prompt.push_str(
            "\nOnly include categories that clearly fit the album. Use [] if none fit.\n",
        );
    }

    prompt.push_str(
        "\nUse null for any value you do not know and [] for unknown lists. \
         Do not guess.",
    );
    prompt
}

/// Decode, shrink to [`MAX_IMAGE_DIMENSION`] and re-encode as JPEG.
/// Returns the base64 payload and its MIME type.
pub fn prepare_image(bytes: &[u8]) -> Result<(String, &'static str), ProviderError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ProviderError::Malformed(format!("cannot decode image: {}", e)))?;

    let (width, height) = img.dimensions();
    let img = if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        img.resize(
            MAX_IMAGE_DIMENSION,
            MAX_IMAGE_DIMENSION,
            image::imageops::FilterType::Triangle,
        )
    } else {
        img
    };

    // JPEG has no alpha channel
    let img = image::DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, 85);
    img.write_with_encoder(encoder)
        .map_err(|e| ProviderError::Malformed(format!("cannot encode image as JPEG: {}", e)))?;

    Ok((BASE64.encode(buf.into_inner()), "image/jpeg"))
}
