//! Fixed preset tables: visual styles, typography directions and the phase
//! labels shown while a stage is running.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

/// A named visual environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StylePreset {
    /// Stable identifier
    pub id: &'static str,
    /// Short display label
    pub label: &'static str,
    /// One of [`STYLE_CATEGORIES`]
    pub category: &'static str,
    /// Prompt text sent to the generation service
    pub prompt: &'static str,
}

/// A typography direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypographySuggestion {
    /// Stable identifier
    pub id: &'static str,
    /// Short display label
    pub label: &'static str,
    /// Prompt text sent to the generation service
    pub prompt: &'static str,
}

/// Style categories, in display order
pub const STYLE_CATEGORIES: [&str; 4] = [
    "Nature & Elemental",
    "Digital & Futuristic",
    "Artistic & Material",
    "Surreal & Abstract",
];

const fn style(
    id: &'static str,
    label: &'static str,
    category: &'static str,
    prompt: &'static str,
) -> StylePreset {
    StylePreset {
        id,
        label,
        category,
        prompt,
    }
}

/// Style presets; an empty style text resolves to a uniform pick from here
pub const STYLE_PRESETS: [StylePreset; 19] = [
    style("cosmic", "Cosmic", STYLE_CATEGORIES[0], "written in glowing constellations against a dark nebula galaxy with cosmic dust"),
    style("natural", "Organic", STYLE_CATEGORIES[0], "arranged using colorful autumn leaves and moss on wet forest floor"),
    style("volcanic", "Magma", STYLE_CATEGORIES[0], "erupting from glowing red molten lava and volcanic ash with floating fire sparks"),
    style("coral", "Oceanic", STYLE_CATEGORIES[0], "growing as bioluminescent coral reefs with tiny tropical fish and sea anemones"),
    style("storm", "Storm", STYLE_CATEGORIES[0], "formed by crackling lightning bolts in a swirling supercell storm cloud at twilight"),
    style("cyber", "Cyber", STYLE_CATEGORIES[1], "reflected in cyberpunk neon puddles on a rainy street at night with glitch effects"),
    style("vaporwave", "Retro", STYLE_CATEGORIES[1], "styled in 80s vaporwave aesthetic with neon sunset grids and palm silhouettes"),
    style("glitch", "Glitch", STYLE_CATEGORIES[1], "fragmented by digital glitch artifacts, data moshing, and chromatic aberration"),
    style("hologram", "Holo", STYLE_CATEGORIES[1], "projected as a flickering cyan 3D hologram with data streams and scanlines"),
    style("steampunk", "Industrial", STYLE_CATEGORIES[2], "arranged with intricate mechanical gears, brass pipes and steampunk machinery"),
    style("minimal", "Minimal", STYLE_CATEGORIES[2], "sculpted from pure white marble in a minimalist gallery with soft shadows"),
    style("origami", "Origami", STYLE_CATEGORIES[2], "meticulously folded from intricate patterned washi paper in soft studio lighting"),
    style("sketch", "Sketch", STYLE_CATEGORIES[2], "sketched with expressive charcoal and graphite strokes on textured vintage parchment"),
    style("gold", "Gilded", STYLE_CATEGORIES[2], "cast in solid molten gold with ornate baroque filigree and velvet shadows"),
    style("liquid", "Liquid", STYLE_CATEGORIES[3], "formed by bioluminescent jellyfish and water bubbles in the deep dark ocean"),
    style("magical", "Arcane", STYLE_CATEGORIES[3], "glowing as ancient magical runes carved into a dark crystalline cave wall"),
    style("glass", "Prism", STYLE_CATEGORIES[3], "refracted through shattered crystalline glass with vibrant rainbow light dispersion"),
    style("ethereal", "Dream", STYLE_CATEGORIES[3], "floating as soft iridescent silk ribbons in a misty, ethereal dreamscape"),
    style("ink", "Ink", STYLE_CATEGORIES[3], "dispersing like heavy black ink drops in a tank of clear water, forming cloud-like shapes"),
];

/// Typography directions offered next to the style field
pub const TYPOGRAPHY_SUGGESTIONS: [TypographySuggestion; 8] = [
    TypographySuggestion { id: "cinematic-3d", label: "3D Cinematic", prompt: "Bold, dimensional 3D text with realistic lighting and shadows" },
    TypographySuggestion { id: "neon-cyber", label: "Neon Cyber", prompt: "Glowing neon tube typography, cyberpunk aesthetic, vibrant bloom" },
    TypographySuggestion { id: "elegant-serif", label: "Classic Serif", prompt: "Refined, high-contrast serif typography, luxury editorial look" },
    TypographySuggestion { id: "bold-sans", label: "Minimalist Bold", prompt: "Massive, heavy sans-serif typography, geometric and impactful" },
    TypographySuggestion { id: "handwritten", label: "Hand-Brushed", prompt: "Organic, flowing handwritten brush script, artistic and personal" },
    TypographySuggestion { id: "retro-80s", label: "80s Chrome", prompt: "Chrome-plated, synthwave style typography with horizon lines and sparkles" },
    TypographySuggestion { id: "liquid-metal", label: "Liquid Chrome", prompt: "Fluid, melting chrome typography, surreal and reflective" },
    TypographySuggestion { id: "botanical", label: "Flora & Fauna", prompt: "Typography intertwined with vines, flowers, and organic nature elements" },
];

/// Phase labels published while the keyframe is generated
pub const IMAGE_PHASE_LABELS: [&str; 4] = [
    "Dreaming textures...",
    "Synthesizing latent space...",
    "Baking 3D lighting...",
    "Calibrating typography...",
];

/// Phase labels published while the video is generated
pub const VIDEO_PHASE_LABELS: [&str; 4] = [
    "Simulating physics...",
    "Interpolating temporal frames...",
    "Upscaling motion vectors...",
    "Finalizing cinematic sequence...",
];

/// Label shown on entry to the keyframe stage
pub const IMAGE_INITIAL_LABEL: &str = "Synthesizing textures...";

/// Label shown on entry to the video stage
pub const VIDEO_INITIAL_LABEL: &str = "Simulating physics...";

/// Uniformly random style prompt
pub fn random_style<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    STYLE_PRESETS
        .choose(rng)
        .map_or(STYLE_PRESETS[0].prompt, |preset| preset.prompt)
}

/// Uniformly random label from a stage table
pub fn random_label<R: Rng + ?Sized>(labels: &[&'static str], rng: &mut R) -> &'static str {
    labels.choose(rng).copied().unwrap_or_default()
}

/// Look up a style preset by id
#[must_use]
pub fn style_by_id(id: &str) -> Option<&'static StylePreset> {
    STYLE_PRESETS.iter().find(|preset| preset.id == id)
}

/// Style presets belonging to one category
pub fn styles_in_category(category: &str) -> impl Iterator<Item = &'static StylePreset> + '_ {
    STYLE_PRESETS
        .iter()
        .filter(move |preset| preset.category == category)
}

/// Look up a typography suggestion by id
#[must_use]
pub fn typography_by_id(id: &str) -> Option<&'static TypographySuggestion> {
    TYPOGRAPHY_SUGGESTIONS
        .iter()
        .find(|suggestion| suggestion.id == id)
}
