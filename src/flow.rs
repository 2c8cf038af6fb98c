//! Branching navigation for the questionnaire wizard.
//!
//! The flow is a small finite-state machine: the next step is a function of
//! the current step and the accumulated [`Answers`]. The server is the
//! single source of truth for branching; the wizard page only renders the
//! step descriptors this module hands out.

use serde::{Deserialize, Serialize};

use crate::response::{
    Answers, Identity, Intention, is_valid_email, is_valid_phone, is_valid_rating,
    is_valid_tax_id,
};

/// Every station of the wizard, both branches included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Welcome,
    Identity,
    Email,
    BusinessName,
    PrivacyConsent,
    /// Dead end reached by declining the privacy terms. Offers a way back.
    PrivacyRejected,

    // Potential-partner branch
    Intention,
    ContactName,
    ContactPhone,
    TaxId,
    InfoSource,
    Referral,
    NotInterestedReason,

    // Existing-partner branch
    Duration,
    NewCustomerCount,
    SatisfactionRating,
    RecommendRating,
    ContactInfo,

    // Terminal steps; which one is reached depends on how the flow ended
    DoneThanks,
    DoneContactSoon,
    DoneNoted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Informational screen, nothing to validate.
    Info,
    Text,
    Choice,
    Multi,
    Rating,
    Number,
    Done,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChoiceOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Everything the wizard page needs to render one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepDescriptor {
    pub key: Step,
    pub kind: StepKind,
    pub question_number: Option<&'static str>,
    pub title: &'static str,
    pub hint: Option<&'static str>,
    /// Long body text (welcome pitch, privacy terms).
    pub body: Option<&'static str>,
    /// Which `Answers` field this step writes, as its JSON key.
    pub field: Option<&'static str>,
    pub placeholder: Option<&'static str>,
    pub options: Vec<ChoiceOption>,
    /// Multi steps with a free-text "other" entry.
    pub allow_other: bool,
}

pub fn first_step() -> Step {
    Step::Welcome
}

pub fn is_terminal(step: Step) -> bool {
    matches!(step, Step::DoneThanks | Step::DoneContactSoon | Step::DoneNoted)
}

/// Check the answer belonging to `step`.
///
/// Advancing past a step is refused while its answer is missing or invalid;
/// the returned message is what the wizard shows under the input.
pub fn validate_step(step: Step, answers: &Answers) -> Result<(), String> {
    match step {
        Step::Welcome | Step::PrivacyRejected => Ok(()),
        Step::Identity => match answers.identity {
            Some(_) => Ok(()),
            None => Err("請先完成身份確認".to_string()),
        },
        Step::Email => {
            if is_valid_email(&answers.email) {
                Ok(())
            } else {
                Err("請輸入有效的電子郵件地址".to_string())
            }
        }
        Step::BusinessName => {
            if answers.business_name.trim().is_empty() {
                Err("商家名稱為必填項目".to_string())
            } else {
                Ok(())
            }
        }
        Step::PrivacyConsent => match answers.privacy_consent.as_str() {
            "yes" | "no" => Ok(()),
            _ => Err("請選擇是否同意個人資料使用條款".to_string()),
        },
        Step::Intention => match answers.intention {
            Some(_) => Ok(()),
            None => Err("請選擇您的合作意向".to_string()),
        },
        Step::ContactName => {
            if answers.contact_name.trim().is_empty() {
                Err("請輸入您的姓名".to_string())
            } else {
                Ok(())
            }
        }
        Step::ContactPhone => {
            if is_valid_phone(&answers.contact_phone) {
                Ok(())
            } else {
                Err("請輸入有效的台灣手機號碼(09開頭,10碼)".to_string())
            }
        }
        Step::TaxId => {
            if is_valid_tax_id(&answers.tax_id) {
                Ok(())
            } else {
                Err("請輸入有效的8位數統一編號".to_string())
            }
        }
        Step::InfoSource => {
            if answers.info_source.is_empty() {
                Err("請至少選擇一個資訊來源".to_string())
            } else {
                Ok(())
            }
        }
        Step::Referral => {
            if answers.referral.as_deref().unwrap_or("").trim().is_empty() {
                Err("請選擇您的推薦意願".to_string())
            } else {
                Ok(())
            }
        }
        Step::NotInterestedReason => {
            if answers.not_interested_reasons.is_empty()
                && answers.not_interested_other.trim().is_empty()
            {
                Err("請至少選擇或填寫一個原因。".to_string())
            } else {
                Ok(())
            }
        }
        Step::Duration => match answers.cooperation_duration {
            Some(_) => Ok(()),
            None => Err("請選擇合作時間".to_string()),
        },
        Step::NewCustomerCount => match answers.new_customer_count {
            Some(_) => Ok(()),
            None => Err("請輸入一個有效的非負整數。".to_string()),
        },
        Step::SatisfactionRating => match answers.satisfaction_rating {
            Some(r) if is_valid_rating(r) => Ok(()),
            _ => Err("請為整體合作滿意度評分(1-5分)".to_string()),
        },
        Step::RecommendRating => match answers.recommend_rating {
            Some(r) if is_valid_rating(r) => Ok(()),
            _ => Err("請為推薦意願評分(1-5分)".to_string()),
        },
        Step::ContactInfo => {
            if answers.contact_info.trim().is_empty() {
                Err("聯絡方式為必填項目。".to_string())
            } else {
                Ok(())
            }
        }
        Step::DoneThanks | Step::DoneContactSoon | Step::DoneNoted => Ok(()),
    }
}

/// Compute the step after `current`, validating `current` first.
pub fn next_step(current: Step, answers: &Answers) -> Result<Step, String> {
    validate_step(current, answers)?;

    match current {
        Step::Welcome => Ok(Step::Identity),
        Step::Identity => Ok(Step::Email),
        Step::Email => Ok(Step::BusinessName),
        Step::BusinessName => Ok(Step::PrivacyConsent),
        Step::PrivacyConsent => {
            if answers.privacy_consent == "no" {
                return Ok(Step::PrivacyRejected);
            }
            match answers.identity {
                Some(Identity::Potential) => Ok(Step::Intention),
                Some(Identity::Existing) => Ok(Step::Duration),
                None => Err("請先完成身份確認".to_string()),
            }
        }
        Step::Intention => Ok(Step::ContactName),
        Step::ContactName => Ok(Step::ContactPhone),
        Step::ContactPhone => Ok(Step::TaxId),
        Step::TaxId => Ok(Step::InfoSource),
        Step::InfoSource => match answers.intention {
            Some(Intention::Interested) => Ok(Step::Referral),
            Some(Intention::MoreInfo) => Ok(Step::DoneContactSoon),
            Some(Intention::NotInterested) => Ok(Step::NotInterestedReason),
            None => Err("請選擇您的合作意向".to_string()),
        },
        Step::Referral => Ok(Step::DoneThanks),
        Step::NotInterestedReason => Ok(Step::DoneNoted),
        Step::Duration => Ok(Step::NewCustomerCount),
        Step::NewCustomerCount => Ok(Step::SatisfactionRating),
        Step::SatisfactionRating => Ok(Step::RecommendRating),
        Step::RecommendRating => Ok(Step::ContactInfo),
        Step::ContactInfo => Ok(Step::DoneThanks),
        Step::PrivacyRejected
        | Step::DoneThanks
        | Step::DoneContactSoon
        | Step::DoneNoted => Err("此步驟無法繼續".to_string()),
    }
}

/// Compute the step before `current`. No validation: backing out of an
/// unfinished answer is always allowed. Terminal steps have no way back.
pub fn prev_step(current: Step, _answers: &Answers) -> Option<Step> {
    match current {
        Step::Welcome => None,
        Step::Identity => Some(Step::Welcome),
        Step::Email => Some(Step::Identity),
        Step::BusinessName => Some(Step::Email),
        Step::PrivacyConsent => Some(Step::BusinessName),
        Step::PrivacyRejected => Some(Step::PrivacyConsent),
        Step::Intention | Step::Duration => Some(Step::PrivacyConsent),
        Step::ContactName => Some(Step::Intention),
        Step::ContactPhone => Some(Step::ContactName),
        Step::TaxId => Some(Step::ContactPhone),
        Step::InfoSource => Some(Step::TaxId),
        Step::Referral | Step::NotInterestedReason => Some(Step::InfoSource),
        Step::NewCustomerCount => Some(Step::Duration),
        Step::SatisfactionRating => Some(Step::NewCustomerCount),
        Step::RecommendRating => Some(Step::SatisfactionRating),
        Step::ContactInfo => Some(Step::RecommendRating),
        Step::DoneThanks | Step::DoneContactSoon | Step::DoneNoted => None,
    }
}

/// The full forward path the current answers select, Welcome first.
///
/// Unanswered branch points assume the longest remaining alternative so the
/// progress bar never jumps backwards when a shorter branch gets picked.
fn path(answers: &Answers) -> Vec<Step> {
    let mut steps = vec![
        Step::Welcome,
        Step::Identity,
        Step::Email,
        Step::BusinessName,
        Step::PrivacyConsent,
    ];

    match answers.identity {
        Some(Identity::Existing) => {
            steps.extend([
                Step::Duration,
                Step::NewCustomerCount,
                Step::SatisfactionRating,
                Step::RecommendRating,
                Step::ContactInfo,
                Step::DoneThanks,
            ]);
        }
        // Potential branch is also the assumption before the identity
        // answer exists (it is the longer of the two).
        Some(Identity::Potential) | None => {
            steps.extend([
                Step::Intention,
                Step::ContactName,
                Step::ContactPhone,
                Step::TaxId,
                Step::InfoSource,
            ]);
            match answers.intention {
                Some(Intention::MoreInfo) => steps.push(Step::DoneContactSoon),
                Some(Intention::NotInterested) => {
                    steps.extend([Step::NotInterestedReason, Step::DoneNoted]);
                }
                Some(Intention::Interested) | None => {
                    steps.extend([Step::Referral, Step::DoneThanks]);
                }
            }
        }
    }

    steps
}

/// Progress through the wizard in percent.
pub fn progress(current: Step, answers: &Answers) -> f32 {
    if is_terminal(current) {
        return 100.0;
    }
    // The rejection screen sits off the main path; report the consent
    // step's position instead.
    let probe = if current == Step::PrivacyRejected {
        Step::PrivacyConsent
    } else {
        current
    };

    let steps = path(answers);
    let position = steps.iter().position(|s| *s == probe).unwrap_or(0);
    (position as f32 / (steps.len() - 1) as f32) * 100.0
}

const PRIVACY_TERMS: &str = "個人資料蒐集、處理及利用告知事項\n\n為提供您更完善的服務,我們需要蒐集您的個人資料。您所提供的個人資料,將依據個人資料保護法及相關法令規定,僅用於以下目的:\n\n- 合作夥伴關係建立與維護\n- 商業服務諮詢與推廣\n- 客戶管理與服務\n- 行銷業務(包含但不限於廣告行銷、問卷調查等)\n\n您可以選擇是否提供個人資料,若您選擇不提供,可能影響您參與本計畫的權益。";

/// Render data for one step.
pub fn descriptor(step: Step) -> StepDescriptor {
    let base = StepDescriptor {
        key: step,
        kind: StepKind::Info,
        question_number: None,
        title: "",
        hint: None,
        body: None,
        field: None,
        placeholder: None,
        options: Vec::new(),
        allow_other: false,
    };

    match step {
        Step::Welcome => StepDescriptor {
            title: "商家合作夥伴計畫",
            body: Some(
                "為顧客創造更流暢的體驗,同時賺取高額回饋。\n這不僅是一份問卷,更是發掘無限商機的起點。\n\n預計填寫時間:僅需 1 分鐘",
            ),
            ..base
        },
        Step::Identity => StepDescriptor {
            kind: StepKind::Choice,
            question_number: Some("第 1 步"),
            title: "身份確認",
            hint: Some("請選擇您的商家目前與本公司的合作關係,我們將據此為您提供最相關的問卷內容。"),
            field: Some("identity"),
            options: vec![
                ChoiceOption { value: "potential", label: "尚未與本公司合作 (潛在合作夥伴)" },
                ChoiceOption { value: "existing", label: "已與本公司合作 (現有合作夥伴)" },
            ],
            ..base
        },
        Step::Email => StepDescriptor {
            kind: StepKind::Text,
            question_number: Some("第 2 步"),
            title: "讓我們認識您。您的商務聯絡信箱是?",
            hint: Some("輸入有效信箱後即可前往下一步(自動轉換全形字元與移除隱藏空白)。"),
            field: Some("email"),
            placeholder: Some("example@email.com"),
            ..base
        },
        Step::BusinessName => StepDescriptor {
            kind: StepKind::Text,
            question_number: Some("第 3 步"),
            title: "貴公司的寶號是?",
            hint: Some("讓我們知道該如何稱呼您。"),
            field: Some("businessName"),
            placeholder: Some("請輸入完整商家名稱"),
            ..base
        },
        Step::PrivacyConsent => StepDescriptor {
            kind: StepKind::Choice,
            question_number: Some("第 4 步"),
            title: "個人資料使用同意",
            body: Some(PRIVACY_TERMS),
            field: Some("privacyConsent"),
            options: vec![
                ChoiceOption { value: "yes", label: "我同意以上個人資料使用條款" },
                ChoiceOption { value: "no", label: "我不同意" },
            ],
            ..base
        },
        Step::PrivacyRejected => StepDescriptor {
            title: "我們尊重您的決定",
            body: Some("未經您的同意,我們不會蒐集任何個人資料。\n若您改變心意,隨時歡迎回來填寫。"),
            ..base
        },
        Step::Intention => StepDescriptor {
            kind: StepKind::Choice,
            question_number: Some("第 5 步"),
            title: "聽起來如何？有興趣嗎？",
            field: Some("intention"),
            options: vec![
                ChoiceOption { value: "interested", label: "很有興趣！想了解更多細節" },
                ChoiceOption { value: "more-info", label: "想跟專人聊聊，看看適不適合" },
                ChoiceOption { value: "not-interested", label: "暫時不考慮，但可以聊聊" },
            ],
            ..base
        },
        Step::ContactName => StepDescriptor {
            kind: StepKind::Text,
            question_number: Some("第 6 步"),
            title: "我們該如何稱呼您?",
            hint: Some("請提供您的真實姓名,以便我們更好地為您服務。"),
            field: Some("contactName"),
            placeholder: Some("請輸入您的姓名"),
            ..base
        },
        Step::ContactPhone => StepDescriptor {
            kind: StepKind::Text,
            question_number: Some("第 7 步"),
            title: "請留下您的聯絡電話",
            hint: Some("合作顧問將盡速與您聯繫,開啟雙贏契機。"),
            field: Some("contactPhone"),
            placeholder: Some("09XX-XXX-XXX"),
            ..base
        },
        Step::TaxId => StepDescriptor {
            kind: StepKind::Text,
            question_number: Some("第 8 步"),
            title: "您的店家統編是多少？",
            hint: Some("8位數字就可以囉～"),
            field: Some("taxId"),
            placeholder: Some("8位數字"),
            ..base
        },
        Step::InfoSource => StepDescriptor {
            kind: StepKind::Multi,
            question_number: Some("第 9 步"),
            title: "很高興您找到了我們!您是從哪裡得知此計畫?",
            field: Some("infoSource"),
            options: vec![
                ChoiceOption { value: "Facebook 廣告", label: "Facebook 廣告" },
                ChoiceOption { value: "Google 搜尋", label: "Google 搜尋" },
                ChoiceOption { value: "Instagram", label: "Instagram" },
                ChoiceOption { value: "朋友推薦", label: "朋友推薦" },
                ChoiceOption { value: "Email 通知", label: "Email 通知" },
                ChoiceOption { value: "官方網站", label: "官方網站" },
                ChoiceOption { value: "其他", label: "其他" },
            ],
            ..base
        },
        Step::Referral => StepDescriptor {
            kind: StepKind::Choice,
            question_number: Some("最後一步"),
            title: "最後！會想推薦給朋友嗎？",
            hint: Some("如果有其他店家朋友，您會推薦這個專案嗎？"),
            field: Some("referral"),
            options: vec![
                ChoiceOption { value: "非常願意", label: "超願意！會主動推薦" },
                ChoiceOption { value: "願意", label: "願意，有機會就推" },
                ChoiceOption { value: "中立", label: "看情況再說" },
                ChoiceOption { value: "不太願意", label: "可能不太會推" },
            ],
            ..base
        },
        Step::NotInterestedReason => StepDescriptor {
            kind: StepKind::Multi,
            question_number: Some("最後一步"),
            title: "您的寶貴意見,是我們進步的動力。",
            hint: Some("請問您暫不考慮的主要原因是?(可複選)"),
            field: Some("notInterestedReasons"),
            options: vec![
                ChoiceOption { value: "時機不合適", label: "時機不合適" },
                ChoiceOption { value: "對合作內容不了解", label: "對合作內容不了解" },
                ChoiceOption { value: "公司資源或預算不足", label: "公司資源或預算不足" },
                ChoiceOption { value: "目前無相關需求", label: "目前無相關需求" },
            ],
            allow_other: true,
            ..base
        },
        Step::Duration => StepDescriptor {
            kind: StepKind::Choice,
            question_number: Some("第 5 步"),
            title: "您與本公司的合作時間有多久了？",
            field: Some("cooperationDuration"),
            options: vec![
                ChoiceOption { value: "<3m", label: "不到3個月" },
                ChoiceOption { value: "3-6m", label: "3–6個月" },
                ChoiceOption { value: "6-12m", label: "6–12個月" },
                ChoiceOption { value: "1y+", label: "1年以上" },
            ],
            ..base
        },
        Step::NewCustomerCount => StepDescriptor {
            kind: StepKind::Number,
            question_number: Some("第 6 步"),
            title: "截至目前為止，我們的合作為您帶來了大約多少位新顧客？",
            hint: Some("請輸入人數,如不確定可估算大約值。"),
            field: Some("newCustomerCount"),
            placeholder: Some("例如：100"),
            ..base
        },
        Step::SatisfactionRating => StepDescriptor {
            kind: StepKind::Rating,
            question_number: Some("第 7 步"),
            title: "整體合作滿意度",
            hint: Some("1 分(非常不滿意)到 5 分(非常滿意),您會給這次合作打幾分?"),
            field: Some("satisfactionRating"),
            ..base
        },
        Step::RecommendRating => StepDescriptor {
            kind: StepKind::Rating,
            question_number: Some("第 8 步"),
            title: "推薦意願評分",
            hint: Some("您有多願意將我們推薦給其他店家?(1-5 分)"),
            field: Some("recommendRating"),
            ..base
        },
        Step::ContactInfo => StepDescriptor {
            kind: StepKind::Text,
            question_number: Some("最後一步"),
            title: "請提供您的聯絡方式（電話或 Email）",
            hint: Some("方便我們在需要時與您聯繫。"),
            field: Some("contactInfo"),
            placeholder: Some("例如：0912-345-678 或 example@company.com"),
            ..base
        },
        Step::DoneThanks => StepDescriptor {
            kind: StepKind::Done,
            title: "感謝您的填寫!",
            body: Some("您的回覆已送出,我們會盡快與您聯繫。"),
            ..base
        },
        Step::DoneContactSoon => StepDescriptor {
            kind: StepKind::Done,
            title: "已收到您的資訊!",
            body: Some("專人將盡快與您聯繫,為您詳細說明合作細節。"),
            ..base
        },
        Step::DoneNoted => StepDescriptor {
            kind: StepKind::Done,
            title: "感謝您的寶貴意見",
            body: Some("我們會持續改進,期待未來有機會與您合作。"),
            ..base
        },
    }
}
