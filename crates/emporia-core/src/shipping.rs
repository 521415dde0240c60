//! # Shipping Fee Policy
//!
//! Computes the shipping fee for a destination address and order subtotal.
//!
//! ## Regional Table
//! ```text
//! ┌────────────┬──────────┬────────────────────┐
//! │ region     │ base fee │ free from subtotal │
//! ├────────────┼──────────┼────────────────────┤
//! │ hcm        │        0 │                  0 │
//! │ hanoi      │   20,000 │            500,000 │
//! │ mien_nam   │   25,000 │            500,000 │
//! │ mien_trung │   35,000 │            800,000 │
//! │ mien_bac   │   30,000 │            500,000 │
//! │ default    │   40,000 │          1,000,000 │
//! └────────────┴──────────┴────────────────────┘
//! ```
//!
//! The region is detected from keywords in the address. Matching ignores
//! case and Vietnamese diacritics, so "Hà Nội", "ha noi" and "HANOI" all
//! resolve to `hanoi`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Policy Trait
// =============================================================================

/// The fee quoted for one checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ShippingQuote {
    pub fee: Money,
    pub region: String,
    pub free_shipping_threshold: Money,
    pub is_free: bool,
}

/// Strategy for computing the shipping fee of an order.
pub trait ShippingFeePolicy: Send + Sync {
    fn quote(&self, address: &str, subtotal: Money) -> ShippingQuote;
}

// =============================================================================
// Flat Policy
// =============================================================================

/// One fee everywhere, waived from `free_threshold` upwards.
#[derive(Debug, Clone, Copy)]
pub struct FlatShippingPolicy {
    pub fee: Money,
    pub free_threshold: Money,
}

impl FlatShippingPolicy {
    /// Never charges shipping.
    pub fn free() -> Self {
        FlatShippingPolicy {
            fee: Money::zero(),
            free_threshold: Money::zero(),
        }
    }
}

impl ShippingFeePolicy for FlatShippingPolicy {
    fn quote(&self, _address: &str, subtotal: Money) -> ShippingQuote {
        let is_free = subtotal >= self.free_threshold;
        ShippingQuote {
            fee: if is_free { Money::zero() } else { self.fee },
            region: "flat".to_string(),
            free_shipping_threshold: self.free_threshold,
            is_free,
        }
    }
}

// =============================================================================
// Regional Policy
// =============================================================================

struct RegionRate {
    region: &'static str,
    base_fee: i64,
    free_threshold: i64,
    /// Unaccented, lowercase.
    keywords: &'static [&'static str],
}

const DEFAULT_REGION: RegionRate = RegionRate {
    region: "default",
    base_fee: 40_000,
    free_threshold: 1_000_000,
    keywords: &[],
};

/// Checked in order; the first keyword hit wins.
const REGIONS: &[RegionRate] = &[
    RegionRate {
        region: "hcm",
        base_fee: 0,
        free_threshold: 0,
        keywords: &[
            "ho chi minh", "hcm", "sai gon", "saigon", "quan 1", "quan 2", "quan 3", "quan 4",
            "quan 5", "quan 6", "quan 7", "quan 8", "quan 9", "binh thanh", "go vap",
            "tan binh", "tan phu", "phu nhuan", "thu duc", "binh tan", "cu chi", "hoc mon",
            "nha be", "can gio",
        ],
    },
    RegionRate {
        region: "hanoi",
        base_fee: 20_000,
        free_threshold: 500_000,
        keywords: &[
            "ha noi", "hanoi", "hoan kiem", "ba dinh", "dong da", "hai ba trung", "hoang mai",
            "thanh xuan", "cau giay", "long bien", "tay ho", "tu liem", "ha dong",
        ],
    },
    RegionRate {
        region: "mien_nam",
        base_fee: 25_000,
        free_threshold: 500_000,
        keywords: &[
            "binh duong", "dong nai", "long an", "tay ninh", "ba ria", "vung tau", "binh phuoc",
            "can tho", "an giang", "kien giang", "ca mau", "bac lieu", "soc trang", "tra vinh",
            "vinh long", "dong thap", "tien giang", "ben tre", "hau giang",
        ],
    },
    RegionRate {
        region: "mien_trung",
        base_fee: 35_000,
        free_threshold: 800_000,
        keywords: &[
            "da nang", "hue", "quang nam", "quang ngai", "binh dinh", "phu yen", "khanh hoa",
            "nha trang", "ninh thuan", "binh thuan", "quang binh", "quang tri", "ha tinh",
            "nghe an", "thanh hoa", "kon tum", "gia lai", "dak lak", "dak nong", "lam dong",
            "da lat",
        ],
    },
    RegionRate {
        region: "mien_bac",
        base_fee: 30_000,
        free_threshold: 500_000,
        keywords: &[
            "hai phong", "quang ninh", "hai duong", "hung yen", "thai binh", "nam dinh",
            "ninh binh", "bac ninh", "bac giang", "vinh phuc", "phu tho", "thai nguyen",
            "lang son", "cao bang", "bac kan", "tuyen quang", "ha giang", "lao cai", "yen bai",
            "dien bien", "lai chau", "son la", "hoa binh",
        ],
    },
];

/// Fee table keyed by region detected from the address.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionalShippingPolicy;

impl RegionalShippingPolicy {
    pub fn new() -> Self {
        RegionalShippingPolicy
    }

    /// Region name for an address, `"default"` when nothing matches.
    pub fn detect_region(address: &str) -> &'static str {
        Self::rate_for(address).region
    }

    fn rate_for(address: &str) -> &'static RegionRate {
        let folded = fold_diacritics(address);
        REGIONS
            .iter()
            .find(|rate| rate.keywords.iter().any(|kw| folded.contains(kw)))
            .unwrap_or(&DEFAULT_REGION)
    }
}

impl ShippingFeePolicy for RegionalShippingPolicy {
    fn quote(&self, address: &str, subtotal: Money) -> ShippingQuote {
        let rate = Self::rate_for(address);
        let threshold = Money::from_minor(rate.free_threshold);
        let is_free = subtotal >= threshold;
        ShippingQuote {
            fee: if is_free {
                Money::zero()
            } else {
                Money::from_minor(rate.base_fee)
            },
            region: rate.region.to_string(),
            free_shipping_threshold: threshold,
            is_free,
        }
    }
}

/// Lowercases and strips Vietnamese tone and vowel marks.
fn fold_diacritics(input: &str) -> String {
    input
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'à' | 'á' | 'ả' | 'ã' | 'ạ' | 'ă' | 'ằ' | 'ắ' | 'ẳ' | 'ẵ' | 'ặ' | 'â' | 'ầ' | 'ấ'
            | 'ẩ' | 'ẫ' | 'ậ' => 'a',
            'è' | 'é' | 'ẻ' | 'ẽ' | 'ẹ' | 'ê' | 'ề' | 'ế' | 'ể' | 'ễ' | 'ệ' => 'e',
            'ì' | 'í' | 'ỉ' | 'ĩ' | 'ị' => 'i',
            'ò' | 'ó' | 'ỏ' | 'õ' | 'ọ' | 'ô' | 'ồ' | 'ố' | 'ổ' | 'ỗ' | 'ộ' | 'ơ' | 'ờ' | 'ớ'
            | 'ở' | 'ỡ' | 'ợ' => 'o',
            'ù' | 'ú' | 'ủ' | 'ũ' | 'ụ' | 'ư' | 'ừ' | 'ứ' | 'ử' | 'ữ' | 'ự' => 'u',
            'ỳ' | 'ý' | 'ỷ' | 'ỹ' | 'ỵ' => 'y',
            'đ' => 'd',
            other => other,
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
