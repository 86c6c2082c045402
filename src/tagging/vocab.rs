//! Fixed tag vocabularies used by the postprocessing pipeline.

/// Label category of character-identity tags, never shown.
pub const CHARACTER_CATEGORY: u32 = 4;

/// Label category of content-rating tags, always ranked first.
pub const RATING_CATEGORY: u32 = 9;

/// Structural tags ranked directly after rating tags.
pub const PRIORITY_TAGS: &[&str] = &["1girl", "1boy", "solo", "monochrome", "greyscale"];

/// Substrings identifying expression-related tags, used to restrict the tags
/// offered for face regions.
pub const EXPRESSION_PATTERNS: &[&str] = &[
    // emotions, positive
    "smile",
    "grin",
    "laughing",
    "happy",
    "smug",
    "doyagao",
    "gentle_smile",
    "excited",
    "triumphant",
    // emotions, negative
    "angry",
    "annoyed",
    "frown",
    "sad",
    "crying",
    "sobbing",
    "tears",
    "streaming_tears",
    "scared",
    "terror",
    "screaming",
    "nervous",
    "worried",
    "depressed",
    "gloom",
    "despair",
    "serious",
    "glare",
    "scorn",
    "disgust",
    "pain",
    // emotions, neutral and other
    "expressionless",
    "blank_stare",
    "bored",
    "sleepy",
    "confused",
    "surprised",
    "shy",
    "embarrassed",
    "flustered",
    "drunk",
    "crazy",
    "insane",
    "aroused",
    "ahegao",
    "torogao",
    "yandere",
    "tsundere",
    "kuudere",
    // complexion
    "blush",
    "heavy_blush",
    "light_blush",
    "blush_stickers",
    "blue_face",
    "turned_pale",
    "shadowed_face",
    "blood_on_face",
    // manpu and symbols
    "sweat",
    "sweatdrop",
    "flying_sweatdrops",
    "anger_vein",
    "popping_vein",
    "gloom_(expression)",
    "sparkles",
    "breath_puff",
    "nose_bubble",
    // fluids and marks
    "drooling",
    "saliva",
    "nosebleed",
    "tear_drop",
    "bags_under_eyes",
    "cheek_press",
    "makeup",
    "facepaint",
    // eye shape and lids
    "closed_eyes",
    "half-closed_eyes",
    "squinting",
    "narrowed_eyes",
    "wide_eyed",
    "wink",
    "one_eye_closed",
    "forced_shut_eyes",
    "tsurime",
    "tareme",
    "jitome",
    "sanpaku",
    // pupils and highlights
    "empty_eyes",
    "hollow_eyes",
    "button_eyes",
    "constricted_pupils",
    "dilated_pupils",
    "slit_pupils",
    "heart-shaped_pupils",
    "star-shaped_pupils",
    "symbol-shaped_pupils",
    "mismatched_pupils",
    "heterochromia",
    "rolling_eyes",
    "cross-eyed",
    "no_pupils",
    // gaze
    "looking_at_viewer",
    "looking_away",
    "looking_back",
    "looking_down",
    "looking_up",
    "looking_to_the_side",
    "eye_contact",
    // mouth
    "open_mouth",
    "closed_mouth",
    "parted_lips",
    "wide_mouth",
    "pout",
    "puffy_cheeks",
    "grimace",
    "lip_biting",
    "holding_breath",
    // teeth and tongue
    "clenched_teeth",
    "showing_teeth",
    "skin_fang",
    "fang",
    "sharp_teeth",
    "shark_teeth",
    "buck_teeth",
    "tongue",
    "tongue_out",
    "licking_lips",
    "forked_tongue",
    // mouth symbols
    "cat_mouth",
    ":3",
    "triangle_mouth",
    "wavy_mouth",
    "dot_mouth",
    "shark_mouth",
    // kaomoji
    "^_^",
    ">_<",
    "@_@",
    "+_+",
    "=_=",
    "o_o",
    "3_3",
    ";)",
    ":d",
    ":p",
    ":o",
    // explicit expression markers
    "orgasm_face",
    "ecstasy",
    "cum_on_face",
    "ejaculated_on_face",
    "cum_in_mouth",
    "cum_on_tongue",
    "facial",
    "bukkake",
    "cum_strings",
    "cum_drip",
    "saliva_strings",
    "fellatio",
    "deep_throat",
    "blowjob",
    "oral",
    "gag",
    "gagged",
    "bit_gag",
    "ball_gag",
    "cleave_gag",
    "ring_gag",
    "spider_gag",
    "tape_gag",
    "hair_gag",
    "collar",
    "leash",
    "neck_bell",
    "neck_bolt",
    "blindfold",
    "eye_mask",
    "nose_hook",
    "mouth_mask",
    "nuzzle",
    "kiss",
    "kissing",
    "hickey",
    "neck_kiss",
    "cum_in_eye",
    "cum_on_hair",
];

/// Returns true if `origin_label` looks like an expression tag.
pub fn is_expression_tag(origin_label: &str) -> bool {
    let folded = origin_label.to_lowercase();
    EXPRESSION_PATTERNS
        .iter()
        .any(|pattern| folded.contains(pattern))
}

/// Returns true if `origin_label` is one of the structural priority tags.
pub fn is_priority_tag(origin_label: &str) -> bool {
    PRIORITY_TAGS.contains(&origin_label)
}
