/// Baseline first-aid kit for a household of up to three people.
const BASE_KIT: [(&str, u32); 10] = [
    ("Sterile gauze pads", 1),
    ("Hydrocolloid bandages", 1),
    ("Hydrogen peroxide", 1),
    ("Cotton balls", 1),
    ("Antibiotic ointment", 1),
    ("Adhesive bandages", 1),
    ("Waterproof bandages", 1),
    ("Ice pack", 2),
    ("Anti-itch cream", 1),
    ("Elastic bandage", 1),
];

/// Items that gain one unit per extra set of household members.
const SCALABLE: [&str; 9] = [
    "Hydrocolloid bandages",
    "Cotton balls",
    "Sterile gauze pads",
    "Adhesive bandages",
    "Waterproof bandages",
    "Ice pack",
    "Elastic bandage",
    "Antibiotic ointment",
    "Anti-itch cream",
];

const MEMBERS_PER_SET: u32 = 3;

/// Number of extra sets for a household: one per started group of three beyond the first three.
pub fn extra_sets(family_count: u32) -> u32 {
    family_count
        .saturating_sub(MEMBERS_PER_SET)
        .div_ceil(MEMBERS_PER_SET)
}

pub fn is_scalable(name: &str) -> bool {
    SCALABLE.contains(&name)
}

/// Default kit entries formatted as `"<name> <quantity>"`.
pub fn default_kit(family_count: u32) -> Vec<String> {
    let extra = extra_sets(family_count.max(1));
    BASE_KIT
        .iter()
        .map(|(name, base)| {
            let quantity = if is_scalable(name) { base + extra } else { *base };
            format!("{name} {quantity}")
        })
        .collect()
}
