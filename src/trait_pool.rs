//! The fixed pools of trait fragments a variation is assembled from.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::error::MonkeyGenError;

const BACKGROUND: &[&str] = &[
    "deep space galaxy with colorful nebula background",
    "vibrant neon city at night background",
    "lush tropical jungle background",
    "golden sunset desert dunes background",
    "underwater ocean scene background",
    "snowy mountain peaks background",
    "cherry blossom garden background",
    "cyberpunk alley with neon lights background",
    "abstract colorful geometric pattern background",
    "dark stormy sky with lightning background",
    "bright solid sky blue background",
    "pastel gradient pink to purple background",
];

const HAT: &[&str] = &[
    "wearing a shiny gold crown",
    "wearing a classic black top hat with red band",
    "wearing a brown cowboy hat",
    "wearing a red beanie with white pompom",
    "wearing a navy NY baseball cap",
    "wearing a white chef hat",
    "wearing a viking helmet with horns",
    "wearing a pirate hat with skull",
    "wearing a colorful jester hat",
    "wearing a wizard hat with stars",
    "no hat",
    "no hat",
];

const GLASSES: &[&str] = &[
    "wearing sleek black sunglasses",
    "wearing red and blue 3D glasses",
    "wearing round gold wire-frame glasses",
    "wearing heart-shaped pink sunglasses",
    "wearing a golden monocle",
    "wearing futuristic LED glasses",
    "wearing classic aviator sunglasses",
    "no glasses",
    "no glasses",
];

const FUR: &[&str] = &[
    "with vibrant golden yellow fur",
    "with deep blue fur",
    "with bright purple fur",
    "with hot pink fur",
    "with neon green fur",
    "with silver white fur",
    "with original brown fur",
    "with dark crimson red fur",
    "with cyan teal fur",
    "with orange fur",
];

const CHAIN: &[&str] = &[
    "wearing a thick gold chain with diamond pendant",
    "wearing a silver chain necklace",
    "wearing multiple layered gold chains",
    "wearing a platinum chain with gem",
    "no chain",
    "no chain",
];

const EXPRESSION: &[&str] = &[
    "with a big happy toothy smile",
    "with a cool serious expression",
    "with a surprised wide-eyed look",
    "with a laughing open mouth expression",
    "with a winking playful expression",
    "with a determined fierce look",
    "with a smug smirk",
];

const CLOTHES: &[&str] = &[
    "wearing a black leather biker jacket",
    "wearing a colorful hawaiian shirt",
    "wearing an elegant black tuxedo with bow tie",
    "wearing a red hooded sweatshirt",
    "wearing a traditional japanese kimono",
    "wearing futuristic silver armor",
    "wearing a denim jacket with patches",
    "wearing a suit and tie",
    "no shirt",
];

const EARRING: &[&str] = &[
    "with a gold hoop earring",
    "with a diamond stud earring",
    "with no earring",
    "with no earring",
];

/// A named axis of visual variation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TraitCategory {
    /// Scene behind the character
    Background,
    /// Headwear
    Hat,
    /// Eyewear
    Glasses,
    /// Fur colour
    Fur,
    /// Necklace
    Chain,
    /// Facial expression
    Expression,
    /// Outfit
    Clothes,
    /// Earring
    Earring,
}

impl TraitCategory {
    /// Every category, in display order.
    pub const ALL: [TraitCategory; 8] = [
        TraitCategory::Background,
        TraitCategory::Hat,
        TraitCategory::Glasses,
        TraitCategory::Fur,
        TraitCategory::Chain,
        TraitCategory::Expression,
        TraitCategory::Clothes,
        TraitCategory::Earring,
    ];

    /// Identifier used in forms and on the command line.
    pub fn id(self) -> &'static str {
        match self {
            TraitCategory::Background => "background",
            TraitCategory::Hat => "hat",
            TraitCategory::Glasses => "glasses",
            TraitCategory::Fur => "fur",
            TraitCategory::Chain => "chain",
            TraitCategory::Expression => "expression",
            TraitCategory::Clothes => "clothes",
            TraitCategory::Earring => "earring",
        }
    }

    /// Human readable label for the studio page.
    pub fn label(self) -> &'static str {
        match self {
            TraitCategory::Background => "🌈 Background",
            TraitCategory::Hat => "🎩 Hat",
            TraitCategory::Glasses => "👓 Glasses",
            TraitCategory::Fur => "🎨 Fur Color",
            TraitCategory::Chain => "📿 Chain",
            TraitCategory::Expression => "😀 Expression",
            TraitCategory::Clothes => "👕 Clothes",
            TraitCategory::Earring => "💎 Earring",
        }
    }

    /// The candidate fragments for this category. Never empty.
    pub fn pool(self) -> &'static [&'static str] {
        match self {
            TraitCategory::Background => BACKGROUND,
            TraitCategory::Hat => HAT,
            TraitCategory::Glasses => GLASSES,
            TraitCategory::Fur => FUR,
            TraitCategory::Chain => CHAIN,
            TraitCategory::Expression => EXPRESSION,
            TraitCategory::Clothes => CLOTHES,
            TraitCategory::Earring => EARRING,
        }
    }

    /// Picks one fragment uniformly at random.
    pub fn sample<R: Rng + ?Sized>(self, rng: &mut R) -> &'static str {
        self.pool().choose(rng).copied().unwrap_or_default()
    }
}

impl fmt::Display for TraitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TraitCategory {
    type Err = MonkeyGenError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_ascii_lowercase();
        TraitCategory::ALL
            .into_iter()
            .find(|category| category.id() == value)
            .ok_or_else(|| MonkeyGenError::BadRequest(format!("Unknown trait category: {value}")))
    }
}

/// Categories active when the studio starts: everything but earrings.
pub fn default_active() -> BTreeSet<TraitCategory> {
    TraitCategory::ALL
        .into_iter()
        .filter(|category| *category != TraitCategory::Earring)
        .collect()
}
