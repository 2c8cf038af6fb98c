use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    // Taiwan mobile number, 09 followed by 8 digits
    static ref PHONE_REGEX: Regex = Regex::new(r"^09\d{8}$").unwrap();
    // Taiwan unified business number, 8 digits
    static ref TAX_ID_REGEX: Regex = Regex::new(r"^\d{8}$").unwrap();
}

/// Which relationship the merchant has with the company.
///
/// This is the branch discriminator of the questionnaire: `potential`
/// partners get the intention/contact question set, `existing` partners get
/// the satisfaction question set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Identity {
    Potential,
    Existing,
}

impl Identity {
    pub fn label_zh(&self) -> &'static str {
        match self {
            Identity::Potential => "潛在合作夥伴",
            Identity::Existing => "現有合作夥伴",
        }
    }
}

/// Cooperation intention of a potential partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intention {
    Interested,
    MoreInfo,
    NotInterested,
}

impl Intention {
    pub fn label_zh(&self) -> &'static str {
        match self {
            Intention::Interested => "有興趣",
            Intention::MoreInfo => "想進一步了解",
            Intention::NotInterested => "暫不考慮",
        }
    }
}

/// How long an existing partner has been cooperating with the company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CooperationDuration {
    #[serde(rename = "<3m")]
    UnderThreeMonths,
    #[serde(rename = "3-6m")]
    ThreeToSixMonths,
    #[serde(rename = "6-12m")]
    SixToTwelveMonths,
    #[serde(rename = "1y+")]
    OverOneYear,
}

impl CooperationDuration {
    pub fn label_zh(&self) -> &'static str {
        match self {
            CooperationDuration::UnderThreeMonths => "不到3個月",
            CooperationDuration::ThreeToSixMonths => "3–6個月",
            CooperationDuration::SixToTwelveMonths => "6–12個月",
            CooperationDuration::OverOneYear => "1年以上",
        }
    }
}

/// Accumulated wizard answers.
///
/// Every field is optional or defaultable: the record fills in step by step
/// as the respondent walks the flow. Branch-specific requirements are only
/// enforced by [`Answers::validate`] once the record reaches a terminal
/// step (and again on the server before the record is stored).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Answers {
    pub identity: Option<Identity>,
    pub email: String,
    pub business_name: String,
    /// "yes" or "no"; a "no" diverts the flow to the rejection step and the
    /// record is never submitted.
    pub privacy_consent: String,

    // Potential-partner branch
    pub intention: Option<Intention>,
    pub contact_name: String,
    pub contact_phone: String,
    pub tax_id: String,
    pub info_source: Vec<String>,
    pub referral: Option<String>,
    pub not_interested_reasons: Vec<String>,
    pub not_interested_other: String,

    // Existing-partner branch
    pub cooperation_duration: Option<CooperationDuration>,
    pub new_customer_count: Option<u32>,
    pub satisfaction_rating: Option<u8>,
    pub recommend_rating: Option<u8>,
    pub contact_info: String,
}

/// A stored questionnaire submission.
///
/// Compared to [`Answers`] the branch discriminator is no longer optional:
/// a `Response` only exists after validation succeeded. Once stored, the
/// record is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: String,
    pub identity: Identity,
    pub email: String,
    pub business_name: String,
    pub privacy_consent: String,
    pub intention: Option<Intention>,
    pub contact_name: String,
    pub contact_phone: String,
    pub tax_id: String,
    pub info_source: Vec<String>,
    pub referral: Option<String>,
    pub not_interested_reasons: Vec<String>,
    pub not_interested_other: String,
    pub cooperation_duration: Option<CooperationDuration>,
    pub new_customer_count: Option<u32>,
    pub satisfaction_rating: Option<u8>,
    pub recommend_rating: Option<u8>,
    pub contact_info: String,
    pub submitted_at: DateTime<Utc>,
}

/// Convert full-width characters to their ASCII counterparts and strip
/// surrounding whitespace. Mirrors what the email step does to pasted input
/// (ideographic spaces included).
pub fn normalize_fullwidth(input: &str) -> String {
    input
        .chars()
        .map(|ch| match ch {
            '\u{ff01}'..='\u{ff5e}' => {
                char::from_u32(ch as u32 - 0xfee0).unwrap_or(ch)
            }
            '\u{3000}' => ' ',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(normalize_fullwidth(email).as_str())
}

/// Dashes and spaces are tolerated in phone input and stripped before the
/// pattern check.
pub fn is_valid_phone(phone: &str) -> bool {
    let clean: String = phone.chars().filter(|c| *c != '-' && *c != ' ').collect();
    PHONE_REGEX.is_match(&clean)
}

pub fn is_valid_tax_id(tax_id: &str) -> bool {
    TAX_ID_REGEX.is_match(tax_id)
}

pub fn is_valid_rating(rating: u8) -> bool {
    (1..=5).contains(&rating)
}

impl Answers {
    /// Validate the whole record against the invariants of its branch.
    ///
    /// Returns the first problem found as a user-facing message. A record
    /// passing this check is complete enough to be stored.
    pub fn validate(&self) -> Result<(), String> {
        let identity = self
            .identity
            .ok_or_else(|| "請先完成身份確認".to_string())?;

        if !is_valid_email(&self.email) {
            return Err("請輸入有效的電子郵件地址".to_string());
        }
        if self.business_name.trim().is_empty() {
            return Err("商家名稱為必填項目".to_string());
        }
        match self.privacy_consent.as_str() {
            "yes" => {}
            "no" => return Err("未同意個人資料使用條款,無法送出問卷".to_string()),
            _ => return Err("請選擇是否同意個人資料使用條款".to_string()),
        }

        match identity {
            Identity::Potential => self.validate_potential(),
            Identity::Existing => self.validate_existing(),
        }
    }

    fn validate_potential(&self) -> Result<(), String> {
        let intention = self
            .intention
            .ok_or_else(|| "請選擇您的合作意向".to_string())?;

        if self.contact_name.trim().is_empty() {
            return Err("請輸入您的姓名".to_string());
        }
        if !is_valid_phone(&self.contact_phone) {
            return Err("請輸入有效的台灣手機號碼(09開頭,10碼)".to_string());
        }
        if !is_valid_tax_id(&self.tax_id) {
            return Err("請輸入有效的8位數統一編號".to_string());
        }
        if self.info_source.is_empty() {
            return Err("請至少選擇一個資訊來源".to_string());
        }

        match intention {
            Intention::Interested => {
                if self.referral.as_deref().unwrap_or("").trim().is_empty() {
                    return Err("請選擇您的推薦意願".to_string());
                }
            }
            Intention::NotInterested => {
                if self.not_interested_reasons.is_empty()
                    && self.not_interested_other.trim().is_empty()
                {
                    return Err("請至少選擇或填寫一個原因。".to_string());
                }
            }
            Intention::MoreInfo => {}
        }

        Ok(())
    }

    fn validate_existing(&self) -> Result<(), String> {
        if self.cooperation_duration.is_none() {
            return Err("請選擇合作時間".to_string());
        }
        if self.new_customer_count.is_none() {
            return Err("請輸入一個有效的非負整數。".to_string());
        }
        match self.satisfaction_rating {
            Some(r) if is_valid_rating(r) => {}
            _ => return Err("請為整體合作滿意度評分(1-5分)".to_string()),
        }
        match self.recommend_rating {
            Some(r) if is_valid_rating(r) => {}
            _ => return Err("請為推薦意願評分(1-5分)".to_string()),
        }
        if self.contact_info.trim().is_empty() {
            return Err("聯絡方式為必填項目。".to_string());
        }

        Ok(())
    }
}

impl Response {
    /// Build an immutable stored record from accumulated answers.
    ///
    /// The answers are validated first; a generated id and the submission
    /// timestamp are attached. Email normalization happens here so stored
    /// records never carry full-width characters.
    pub fn from_answers(answers: &Answers) -> Result<Self, String> {
        answers.validate()?;

        // validate() guarantees the discriminator is present
        let identity = answers.identity.expect("validated answers carry identity");

        Ok(Response {
            id: Uuid::new_v4().to_string(),
            identity,
            email: normalize_fullwidth(&answers.email),
            business_name: answers.business_name.trim().to_string(),
            privacy_consent: answers.privacy_consent.clone(),
            intention: answers.intention,
            contact_name: answers.contact_name.trim().to_string(),
            contact_phone: answers
                .contact_phone
                .chars()
                .filter(|c| *c != '-' && *c != ' ')
                .collect(),
            tax_id: answers.tax_id.clone(),
            info_source: answers.info_source.clone(),
            referral: answers.referral.clone(),
            not_interested_reasons: answers.not_interested_reasons.clone(),
            not_interested_other: answers.not_interested_other.trim().to_string(),
            cooperation_duration: answers.cooperation_duration,
            new_customer_count: answers.new_customer_count,
            satisfaction_rating: answers.satisfaction_rating,
            recommend_rating: answers.recommend_rating,
            contact_info: answers.contact_info.trim().to_string(),
            submitted_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn potential_answers() -> Answers {
        Answers {
            identity: Some(Identity::Potential),
            email: "owner@shop.tw".to_string(),
            business_name: "好味小館".to_string(),
            privacy_consent: "yes".to_string(),
            intention: Some(Intention::Interested),
            contact_name: "王小明".to_string(),
            contact_phone: "0912-345-678".to_string(),
            tax_id: "12345678".to_string(),
            info_source: vec!["朋友推薦".to_string()],
            referral: Some("非常願意".to_string()),
            ..Answers::default()
        }
    }

    pub(crate) fn existing_answers() -> Answers {
        Answers {
            identity: Some(Identity::Existing),
            email: "boss@cafe.tw".to_string(),
            business_name: "巷口咖啡".to_string(),
            privacy_consent: "yes".to_string(),
            cooperation_duration: Some(CooperationDuration::ThreeToSixMonths),
            new_customer_count: Some(120),
            satisfaction_rating: Some(4),
            recommend_rating: Some(5),
            contact_info: "0922-000-111".to_string(),
            ..Answers::default()
        }
    }

    #[test]
    fn normalizes_fullwidth_input() {
        assert_eq!(
            normalize_fullwidth("ｏｗｎｅｒ＠ｓｈｏｐ．ｔｗ"),
            "owner@shop.tw"
        );
        assert_eq!(normalize_fullwidth("\u{3000}a@b.c\u{3000}"), "a@b.c");
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("owner@shop.tw"));
        assert!(is_valid_email("ｏｗｎｅｒ＠ｓｈｏｐ．ｔｗ"));
        assert!(!is_valid_email("owner@shop"));
        assert!(!is_valid_email("owner shop@x.tw"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn phone_validation_strips_separators() {
        assert!(is_valid_phone("0912345678"));
        assert!(is_valid_phone("0912-345-678"));
        assert!(is_valid_phone("0912 345 678"));
        assert!(!is_valid_phone("0212345678"));
        assert!(!is_valid_phone("09123456789"));
        assert!(!is_valid_phone("091234567"));
    }

    #[test]
    fn tax_id_validation() {
        assert!(is_valid_tax_id("12345678"));
        assert!(!is_valid_tax_id("1234567"));
        assert!(!is_valid_tax_id("1234567a"));
    }

    #[test]
    fn potential_branch_requires_its_fields() {
        let mut a = potential_answers();
        assert!(a.validate().is_ok());

        a.contact_phone = "123".to_string();
        assert!(a.validate().is_err());

        let mut a = potential_answers();
        a.info_source.clear();
        assert!(a.validate().is_err());

        // existing-branch fields stay irrelevant on this branch
        let mut a = potential_answers();
        a.satisfaction_rating = None;
        assert!(a.validate().is_ok());
    }

    #[test]
    fn interested_requires_referral() {
        let mut a = potential_answers();
        a.referral = None;
        assert!(a.validate().is_err());

        a.intention = Some(Intention::MoreInfo);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn not_interested_requires_a_reason() {
        let mut a = potential_answers();
        a.intention = Some(Intention::NotInterested);
        a.referral = None;
        assert!(a.validate().is_err());

        a.not_interested_other = "自己經營外送".to_string();
        assert!(a.validate().is_ok());

        a.not_interested_other.clear();
        a.not_interested_reasons.push("時機不合適".to_string());
        assert!(a.validate().is_ok());
    }

    #[test]
    fn existing_branch_requires_ratings_in_range() {
        let mut a = existing_answers();
        assert!(a.validate().is_ok());

        a.satisfaction_rating = Some(0);
        assert!(a.validate().is_err());

        a.satisfaction_rating = Some(6);
        assert!(a.validate().is_err());

        a.satisfaction_rating = Some(1);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn consent_must_be_yes() {
        let mut a = potential_answers();
        a.privacy_consent = "no".to_string();
        assert!(a.validate().is_err());

        a.privacy_consent = String::new();
        assert!(a.validate().is_err());
    }

    #[test]
    fn from_answers_attaches_id_and_timestamp() {
        let a = existing_answers();
        let r = Response::from_answers(&a).unwrap();
        assert_eq!(r.identity, Identity::Existing);
        assert!(!r.id.is_empty());
        assert_ne!(
            Response::from_answers(&a).unwrap().id,
            r.id,
            "ids must be generated per record"
        );
    }

    #[test]
    fn from_answers_normalizes_stored_fields() {
        let mut a = potential_answers();
        a.email = "ＯＷＮＥＲ＠ＳＨＯＰ．ＴＷ".to_lowercase();
        a.contact_phone = "0912-345-678".to_string();
        a.business_name = " 好味小館 ".to_string();
        let r = Response::from_answers(&a).unwrap();
        assert_eq!(r.email, "owner@shop.tw");
        assert_eq!(r.contact_phone, "0912345678");
        assert_eq!(r.business_name, "好味小館");
    }

    #[test]
    fn from_answers_rejects_invalid_records() {
        assert!(Response::from_answers(&Answers::default()).is_err());
    }

    #[test]
    fn answers_json_uses_camel_case_keys() {
        let a = potential_answers();
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.contains("\"businessName\""));
        assert!(json.contains("\"privacyConsent\""));
        assert!(json.contains("\"intention\":\"interested\""));
        assert!(json.contains("\"identity\":\"potential\""));

        let back: Answers = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn duration_serializes_to_compact_codes() {
        let json =
            serde_json::to_string(&CooperationDuration::UnderThreeMonths).unwrap();
        assert_eq!(json, "\"<3m\"");
        let back: CooperationDuration = serde_json::from_str("\"1y+\"").unwrap();
        assert_eq!(back, CooperationDuration::OverOneYear);
    }
}
