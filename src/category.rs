//! Category label normalization and category-group lookup.
//!
//! Every call site that needs a canonical category or its broader group
//! goes through [`normalize`] and [`group_of`].

use std::collections::HashMap;
use std::sync::LazyLock;

/// Group assigned to labels outside the dictionary.
pub const FALLBACK_GROUP: &str = "その他";

/// Synonym -> canonical label. Keys are matched after trimming and ASCII lowercasing.
static SYNONYMS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("カフェ", "カフェ"),
        ("cafe", "カフェ"),
        ("café", "カフェ"),
        ("coffee", "カフェ"),
        ("喫茶店", "カフェ"),
        ("喫茶", "カフェ"),
        ("コーヒーショップ", "カフェ"),
        ("レストラン", "レストラン"),
        ("restaurant", "レストラン"),
        ("飲食店", "レストラン"),
        ("洋食", "レストラン"),
        ("イタリアン", "レストラン"),
        ("居酒屋", "居酒屋"),
        ("izakaya", "居酒屋"),
        ("バー", "居酒屋"),
        ("bar", "居酒屋"),
        ("ベーカリー", "ベーカリー"),
        ("パン屋", "ベーカリー"),
        ("bakery", "ベーカリー"),
        ("スイーツ", "スイーツ"),
        ("ケーキ屋", "スイーツ"),
        ("洋菓子店", "スイーツ"),
        ("和菓子", "スイーツ"),
        ("美容室", "美容室"),
        ("美容院", "美容室"),
        ("ヘアサロン", "美容室"),
        ("hair salon", "美容室"),
        ("salon", "美容室"),
        ("ネイルサロン", "ネイルサロン"),
        ("ネイル", "ネイルサロン"),
        ("nail", "ネイルサロン"),
        ("エステ", "エステ"),
        ("エステサロン", "エステ"),
        ("リラクゼーション", "エステ"),
        ("雑貨店", "雑貨店"),
        ("雑貨", "雑貨店"),
        ("セレクトショップ", "雑貨店"),
        ("アパレル", "アパレル"),
        ("古着屋", "アパレル"),
        ("洋服", "アパレル"),
        ("花屋", "花屋"),
        ("フラワーショップ", "花屋"),
        ("florist", "花屋"),
        ("ジム", "ジム"),
        ("フィットネス", "ジム"),
        ("gym", "ジム"),
        ("ヨガ", "ジム"),
        ("整体", "整体"),
        ("整骨院", "整体"),
        ("教室", "教室"),
        ("スクール", "教室"),
        ("塾", "教室"),
    ])
});

/// Canonical label -> category group.
static GROUPS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("カフェ", "飲食"),
        ("レストラン", "飲食"),
        ("居酒屋", "飲食"),
        ("ベーカリー", "飲食"),
        ("スイーツ", "飲食"),
        ("美容室", "美容"),
        ("ネイルサロン", "美容"),
        ("エステ", "美容"),
        ("雑貨店", "小売"),
        ("アパレル", "小売"),
        ("花屋", "小売"),
        ("ジム", "暮らし・サービス"),
        ("整体", "暮らし・サービス"),
        ("教室", "暮らし・サービス"),
    ])
});

/// Resolve a free-form category label to its canonical form.
///
/// Unknown labels are returned trimmed but otherwise untouched.
pub fn normalize(label: &str) -> String {
    let trimmed = label.trim();
    let key = trimmed.to_ascii_lowercase();
    SYNONYMS
        .get(key.as_str())
        .map(|canonical| canonical.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Broad group of a canonical label.
pub fn group_of(canonical: &str) -> &'static str {
    GROUPS.get(canonical).copied().unwrap_or(FALLBACK_GROUP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_synonyms_and_case() {
        assert_eq!(normalize("Cafe"), "カフェ");
        assert_eq!(normalize("  喫茶店 "), "カフェ");
        assert_eq!(normalize("パン屋"), "ベーカリー");
        assert_eq!(normalize("Hair Salon"), "美容室");
    }

    #[test]
    fn test_unknown_label_passes_through() {
        assert_eq!(normalize(" 陶芸工房 "), "陶芸工房");
        assert_eq!(group_of("陶芸工房"), FALLBACK_GROUP);
    }

    #[test]
    fn test_group_of() {
        assert_eq!(group_of("カフェ"), "飲食");
        assert_eq!(group_of(&normalize("nail")), "美容");
        assert_eq!(group_of("花屋"), "小売");
    }

    #[test]
    fn test_every_canonical_label_has_a_group() {
        for canonical in SYNONYMS.values() {
            assert_ne!(group_of(canonical), FALLBACK_GROUP, "{canonical}");
        }
    }
}
