//! Category taxonomy and keyword heuristics
//!
//! Holds the seed category list, the legacy-name remapping table, and the
//! keyword tables used to guess a category when no learned rule applies.
//! Every guess goes through [`pick_existing_category`] so a result never
//! names a category the user doesn't have.

use crate::normalize::normalize_description;

/// Categories created for every new user
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Groceries",
    "Restaurants",
    "Bakery & Coffee",
    "Mortgage",
    "Condo Fees",
    "Property Tax",
    "Utilities",
    "Home Maintenance & Repairs",
    "Furniture & Appliances",
    "Gas & Fuel",
    "Car Maintenance & Registration",
    "Insurance",
    "Parking",
    "Public Transit",
    "School & Education",
    "Sports & Activities",
    "Camps & Lessons",
    "Equipment",
    "Pet Food & Care",
    "Entertainment",
    "Subscriptions",
    "Activities & Recreation",
    "Tickets & Events",
    "General Shopping",
    "Electronics",
    "Cosmetics & Personal Care",
    "Clothing",
    "Pharmacy & Medical",
    "Dentist & Dental",
    "Alcohol & Wine",
    "Gifts & Presents",
    "Travel & Vacation",
    "Personal",
    "Credit Card Payments",
    "Transfers",
];

/// Old category names (normalized) and the seed category that replaces them
pub const LEGACY_CATEGORY_MAPPING: &[(&str, &str)] = &[
    ("food", "Groceries"),
    ("boulangerie", "Bakery & Coffee"),
    ("sushi", "Restaurants"),
    ("eating out", "Restaurants"),
    ("dine out", "Restaurants"),
    ("house", "Home Maintenance & Repairs"),
    ("home", "Home Maintenance & Repairs"),
    ("furniture", "Furniture & Appliances"),
    ("appliance", "Furniture & Appliances"),
    ("deck", "Home Maintenance & Repairs"),
    ("air conditioner", "Home Maintenance & Repairs"),
    ("hydro-quebec", "Utilities"),
    ("internet", "Utilities"),
    ("virgin", "Utilities"),
    ("gas", "Gas & Fuel"),
    ("stm", "Public Transit"),
    ("parking", "Parking"),
    ("car registration", "Car Maintenance & Registration"),
    ("car dl", "Car Maintenance & Registration"),
    ("david hockey", "Sports & Activities"),
    ("equipment david", "Equipment"),
    ("david summer camp", "Camps & Lessons"),
    ("david piano", "Activities & Recreation"),
    ("ecole ste-anne", "School & Education"),
    ("cookie food", "Pet Food & Care"),
    ("amazon", "General Shopping"),
    ("electronics", "Electronics"),
    ("cosmetics", "Cosmetics & Personal Care"),
    ("cinema", "Entertainment"),
    ("tickets", "Tickets & Events"),
    ("aquaparc", "Activities & Recreation"),
    ("ski", "Activities & Recreation"),
    ("tennis", "Activities & Recreation"),
    ("mortgage", "Mortgage"),
    ("condo fees", "Condo Fees"),
    ("property tax", "Property Tax"),
    ("payment thank you", "Credit Card Payments"),
    ("transfer", "Transfers"),
    ("return", "Transfers"),
    ("points", "Transfers"),
];

pub const TRANSFER_KEYWORDS: &[&str] = &[
    "payment received",
    "credit card payment",
    "transfer",
    "e-transfer",
    "direct deposit",
    "refund",
    "return",
    "points",
];

pub const PAYMENT_KEYWORDS: &[&str] = &[
    "payment received",
    "thank you",
    "online payment",
    "autopay",
    "payment thank you",
    "payment",
];

pub const PERSONAL_KEYWORDS: &[&str] = &[
    "salon", "spa", "barber", "gym", "hobby", "massage", "openai", "open ai", "chatgpt",
];

/// Keyword -> tag label
pub const TAG_KEYWORDS: &[(&str, &str)] = &[("david", "David"), ("denys", "Denys"), ("cookie", "Cookie")];

/// Ordered merchant keyword table; first matching category wins
pub const MERCHANT_RULES: &[(&str, &[&str])] = &[
    ("Groceries", &["metro", "iga", "provigo", "loblaws", "super c"]),
    (
        "Bakery & Coffee",
        &["boulangerie", "bakery", "patisserie", "cafe", "coffee", "starbucks", "tim hortons"],
    ),
    ("Gas & Fuel", &["gas", "esso", "shell", "petro"]),
    ("Public Transit", &["stm"]),
    ("General Shopping", &["amazon", "shop", "walmart", "canadian tire"]),
    ("Utilities", &["hydro", "bell", "videotron", "virgin"]),
    ("Sports & Activities", &["hockey", "tennis", "ski", "camp", "piano"]),
    (
        "Subscriptions",
        &[
            "apple.com/bill",
            "apple bill",
            "itunes",
            "icloud",
            "apple music",
            "apple tv",
            "netflix",
            "disney",
            "spotify",
        ],
    ),
];

/// Categories reimbursed in full to the payer instead of split
pub const PET_CATEGORIES: &[&str] = &["Pet Food & Care", "Pet", "Vet", "Pet Insurance"];

pub const PERSONAL_CATEGORY: &str = "Personal";
pub const TRANSFERS_CATEGORY: &str = "Transfers";
pub const CREDIT_CARD_PAYMENTS_CATEGORY: &str = "Credit Card Payments";

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

/// Whether a description mentions a card payment
pub fn has_payment_keyword(normalized_description: &str) -> bool {
    contains_any(normalized_description, PAYMENT_KEYWORDS)
}

/// Resolve a category name against the ones a user actually has
///
/// Matching is case and accent-insensitive. `preferred` is tried first, then
/// `fallback`. With an empty `available` set nothing can be checked, so the
/// first non-empty choice is returned as-is; otherwise an empty string means
/// neither choice exists.
pub fn pick_existing_category(preferred: &str, available: &[String], fallback: Option<&str>) -> String {
    let fallback = fallback.unwrap_or("");
    if preferred.is_empty() && fallback.is_empty() {
        return String::new();
    }

    if available.is_empty() {
        return if preferred.is_empty() {
            fallback.to_string()
        } else {
            preferred.to_string()
        };
    }

    for choice in [preferred, fallback] {
        if choice.is_empty() {
            continue;
        }
        let wanted = normalize_description(choice);
        if let Some(found) = available
            .iter()
            .find(|name| normalize_description(name) == wanted)
        {
            return found.clone();
        }
    }

    String::new()
}

/// Canonical name for a raw or legacy category label
pub fn map_category_name(raw_category: &str) -> String {
    let cleaned = raw_category.trim();
    if cleaned.is_empty() {
        return String::new();
    }
    if DEFAULT_CATEGORIES.contains(&cleaned) {
        return cleaned.to_string();
    }

    let normalized = normalize_description(cleaned);
    LEGACY_CATEGORY_MAPPING
        .iter()
        .find(|(legacy, _)| *legacy == normalized)
        .map(|(_, current)| (*current).to_string())
        .unwrap_or_else(|| cleaned.to_string())
}

/// Keyword heuristic used when no learned rule applies
///
/// Returns an empty string when nothing matches.
pub fn infer_category(description: &str, raw_category: &str, available: &[String]) -> String {
    let mapped = map_category_name(raw_category);
    if !mapped.is_empty() {
        let picked = pick_existing_category(&mapped, available, None);
        if !picked.is_empty() {
            return picked;
        }
    }

    let desc = normalize_description(description);

    if has_payment_keyword(&desc) {
        return pick_existing_category(
            CREDIT_CARD_PAYMENTS_CATEGORY,
            available,
            Some(TRANSFERS_CATEGORY),
        );
    }

    if contains_any(&desc, PERSONAL_KEYWORDS) {
        return pick_existing_category(PERSONAL_CATEGORY, available, None);
    }

    if desc.contains("apple online store") || desc.contains("apple store") {
        return pick_existing_category("Electronics", available, Some("General Shopping"));
    }

    if desc.contains("ikea") {
        return pick_existing_category(
            "Furniture & Appliances",
            available,
            Some("General Shopping"),
        );
    }

    if desc.contains("costco") {
        let groceries = pick_existing_category("Groceries", available, None);
        if !groceries.is_empty() {
            return groceries;
        }
    }

    for (category, keywords) in MERCHANT_RULES {
        if contains_any(&desc, keywords) {
            return pick_existing_category(category, available, None);
        }
    }

    if contains_any(&desc, TRANSFER_KEYWORDS) {
        return pick_existing_category(TRANSFERS_CATEGORY, available, None);
    }

    String::new()
}

/// Whether a category name is one of the transfer categories
pub fn is_transfer_category(category_name: &str) -> bool {
    matches!(
        normalize_description(category_name).as_str(),
        "transfers" | "credit card payments"
    )
}

/// Whether a transaction moves money rather than spends it
///
/// A recognized transfer category says yes, any other category says no, and
/// without a category the description keywords decide.
pub fn is_transfer_transaction(description: &str, category_name: &str) -> bool {
    if is_transfer_category(category_name) {
        return true;
    }
    if !normalize_description(category_name).is_empty() {
        return false;
    }
    let desc = normalize_description(description);
    contains_any(&desc, TRANSFER_KEYWORDS) || has_payment_keyword(&desc)
}

pub fn is_personal_category(category_name: &str) -> bool {
    category_name == PERSONAL_CATEGORY
}

pub fn is_pet_category(category_name: &str) -> bool {
    PET_CATEGORIES.contains(&category_name)
}

/// Tag labels whose keyword appears in the description
pub fn derive_tags(description: &str) -> Vec<String> {
    let desc = normalize_description(description);
    TAG_KEYWORDS
        .iter()
        .filter(|(keyword, _)| desc.contains(keyword))
        .map(|(_, tag)| (*tag).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Vec<String> {
        DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_seed_list_size() {
        assert_eq!(DEFAULT_CATEGORIES.len(), 35);
    }

    #[test]
    fn test_pick_existing_category() {
        let available = vec!["Groceries".to_string(), "Transfers".to_string()];
        assert_eq!(pick_existing_category("groceries", &available, None), "Groceries");
        assert_eq!(
            pick_existing_category("Credit Card Payments", &available, Some("Transfers")),
            "Transfers"
        );
        assert_eq!(pick_existing_category("Electronics", &available, None), "");
        assert_eq!(pick_existing_category("Electronics", &[], None), "Electronics");
        assert_eq!(pick_existing_category("", &[], Some("Transfers")), "Transfers");
        assert_eq!(pick_existing_category("", &available, None), "");
    }

    #[test]
    fn test_map_category_name() {
        assert_eq!(map_category_name("Groceries"), "Groceries");
        assert_eq!(map_category_name(" Eating Out "), "Restaurants");
        assert_eq!(map_category_name("Hydro-Québec"), "Utilities");
        assert_eq!(map_category_name("Something Else"), "Something Else");
        assert_eq!(map_category_name("   "), "");
    }

    #[test]
    fn test_infer_category_keywords() {
        let available = seeded();
        assert_eq!(infer_category("METRO PLUS #123", "", &available), "Groceries");
        assert_eq!(infer_category("Tim Hortons", "", &available), "Bakery & Coffee");
        assert_eq!(infer_category("NETFLIX.COM", "", &available), "Subscriptions");
        assert_eq!(infer_category("Hair Salon", "", &available), "Personal");
        assert_eq!(infer_category("APPLE STORE DIX30", "", &available), "Electronics");
        assert_eq!(infer_category("IKEA Montreal", "", &available), "Furniture & Appliances");
        assert_eq!(infer_category("COSTCO WHOLESALE", "", &available), "Groceries");
        assert_eq!(
            infer_category("PAYMENT THANK YOU", "", &available),
            "Credit Card Payments"
        );
        assert_eq!(infer_category("Random Merchant", "", &available), "");
    }

    #[test]
    fn test_infer_category_respects_available_set() {
        let available = vec!["General Shopping".to_string()];
        assert_eq!(infer_category("IKEA", "", &available), "General Shopping");
        assert_eq!(infer_category("COSTCO", "", &available), "");
        assert_eq!(infer_category("METRO", "", &available), "");
    }

    #[test]
    fn test_infer_category_uses_raw_hint() {
        assert_eq!(infer_category("anything", "Sushi", &seeded()), "Restaurants");
        assert_eq!(infer_category("anything", "Bespoke", &seeded()), "");
    }

    #[test]
    fn test_unknown_raw_hint_falls_through_to_keywords() {
        assert_eq!(
            infer_category("TIM HORTONS #123", "Restaurant-Dining", &seeded()),
            "Bakery & Coffee"
        );
        assert_eq!(infer_category("", "Restaurant-Dining", &seeded()), "");
    }

    #[test]
    fn test_is_transfer_transaction() {
        assert!(is_transfer_transaction("anything", "Transfers"));
        assert!(is_transfer_transaction("anything", "credit card payments"));
        assert!(!is_transfer_transaction("E-TRANSFER to landlord", "Mortgage"));
        assert!(is_transfer_transaction("E-TRANSFER to landlord", ""));
        assert!(is_transfer_transaction("PAYMENT RECEIVED", ""));
        assert!(!is_transfer_transaction("Metro", ""));
    }

    #[test]
    fn test_derive_tags() {
        assert_eq!(derive_tags("David hockey - Cookie vet"), vec!["David", "Cookie"]);
        assert!(derive_tags("Metro").is_empty());
    }
}
