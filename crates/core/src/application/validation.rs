//! Submit-time validation: everything checked before a job record is
//! created. Every failure is a `DomainError::InvalidInput{field, message}`
//! carrying one of the field tags.

use crate::domain::{DomainError, SubmitOptions};

const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
const MAX_BRAND_NAME_CHARS: usize = 100;
const MAX_PRODUCT_NAME_CHARS: usize = 200;
const MIN_PACKAGE_VARIATIONS: u32 = 1;
const MAX_PACKAGE_VARIATIONS: u32 = 10;

fn invalid(field: &str, message: impl Into<String>) -> DomainError {
    DomainError::InvalidInput {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Required for every job regardless of options.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), DomainError> {
    if bytes.is_empty() {
        return Err(invalid("imageBuffer", "image bytes must not be empty"));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(invalid(
            "imageBuffer",
            format!("image is {} bytes, exceeds the 10 MiB limit", bytes.len()),
        ));
    }
    if detect_image_format(bytes).is_none() {
        return Err(invalid(
            "imageBuffer",
            "unrecognized image format, expected JPEG, PNG, or WebP",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
}

/// Magic-number sniffing per JPEG (`FF D8`), PNG (8-byte signature), or
/// WebP (`RIFF` container carrying a `WEBP` form type).
pub fn detect_image_format(bytes: &[u8]) -> Option<ImageFormat> {
    const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xD8 {
        return Some(ImageFormat::Jpeg);
    }
    if bytes.len() >= 8 && bytes[..8] == PNG_SIGNATURE {
        return Some(ImageFormat::Png);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(ImageFormat::WebP);
    }
    None
}

pub fn validate_options(options: &SubmitOptions) -> Result<(), DomainError> {
    if let Some(brand) = &options.brand_name {
        if brand.chars().count() > MAX_BRAND_NAME_CHARS {
            return Err(invalid(
                "brandName",
                format!("brand name exceeds {} characters", MAX_BRAND_NAME_CHARS),
            ));
        }
    }
    if let Some(product) = &options.product_name {
        if product.chars().count() > MAX_PRODUCT_NAME_CHARS {
            return Err(invalid(
                "productName",
                format!("product name exceeds {} characters", MAX_PRODUCT_NAME_CHARS),
            ));
        }
    }
    if options.package_variations < MIN_PACKAGE_VARIATIONS
        || options.package_variations > MAX_PACKAGE_VARIATIONS
    {
        return Err(invalid(
            "packageVariations",
            format!(
                "packageVariations must be between {} and {}, got {}",
                MIN_PACKAGE_VARIATIONS, MAX_PACKAGE_VARIATIONS, options.package_variations
            ),
        ));
    }
    Ok(())
}

/// credential-presence check, expressed against whichever capabilities
/// the caller actually wired in (a capability being absent is represented by
/// the orchestrator not holding one, not by a missing API key string — this
/// crate has no concrete HTTP-backed capability to hold a credential for).
pub struct CapabilityPresence {
    pub has_analyzer: bool,
    pub has_image_synthesizer: bool,
    pub has_text_synthesizer: bool,
}

pub fn validate_capability_presence(
    options: &SubmitOptions,
    presence: &CapabilityPresence,
) -> Result<(), DomainError> {
    if !presence.has_analyzer {
        return Err(invalid("claudeApiKey", "no analyzer capability configured"));
    }
    if !(options.skip_packages && options.skip_ads) && !presence.has_image_synthesizer {
        return Err(invalid(
            "openaiApiKey",
            "no image synthesizer capability configured",
        ));
    }
    if !options.skip_texts && !presence.has_text_synthesizer {
        return Err(invalid("claudeApiKey", "no text synthesizer capability configured"));
    }
    Ok(())
}
