//! Topical domain classification
//!
//! Rules are checked in order and the first match wins, so more specific
//! vocabularies (ritual purity) sit ahead of broader ones (prayer) that
//! share words with them.

use crate::config::ClassifierConfig;
use crate::error::Result;
use regex::Regex;

/// Built-in taxonomy, in priority order
const BUILTIN_RULES: &[(&str, &str)] = &[
    ("purification", "طهارة|وضوء|غسل|تيمم|نجاسة|حيض|جنابة"),
    ("prayer", "صلاة|صلوات|جمعة|أذان|إمامة|قبلة|سجود|ركوع"),
    ("zakat", "زكاة|صدقة|نصاب|عشر"),
    ("fasting", "صيام|صوم|رمضان|إفطار|سحور|اعتكاف"),
    ("hajj-umrah", "حج|عمرة|إحرام|طواف|سعي|حرم|مكة|منى|عرفة"),
    ("marriage", "نكاح|زواج|خطبة|مهر|ولاية|زوجة|زوج"),
    ("divorce", "طلاق|خلع|فسخ|عدة|رجعة|إيلاء|ظهار|لعان"),
    ("inheritance", "مواريث|ميراث|وصية|تركة|فرائض|إرث|وارث"),
    ("commerce", "بيوع|بيع|شراء|إجارة|وكالة|شركة|رهن|مضاربة"),
    ("islamic-finance", "ربا|مصارف|بنوك|تأمين|أسهم|صكوك|مرابحة"),
    ("food", "أطعمة|ذبائح|صيد|خمر|مسكر|حلال|حرام"),
    ("clothing", "لباس|زينة|حجاب|ذهب|فضة|حرير|عطر"),
    ("social-relations", "أخلاق|معاملة|جيران|صلة|رحم|والدين|بر"),
    ("creed", "عقيدة|توحيد|إيمان|شرك|بدعة|ولاء|براء"),
    ("quran", "قرآن|تلاوة|تجويد|حفظ|تفسير|مصحف"),
    ("invocations", "أذكار|دعاء|رقية|تسبيح|استغفار"),
    ("medical", "طب|علاج|دواء|جراحة|تبرع|أعضاء|مريض"),
    ("work", "عمل|وظيفة|أجرة|موظف|راتب|مهنة"),
    ("technology", "إنترنت|هاتف|تلفزيون|صور|فيديو|تصوير|حاسوب"),
    ("jihad", "جهاد|دفاع|أمة|سلطان|حاكم"),
];

struct Rule {
    tag: String,
    pattern: Regex,
}

/// Ordered, first-match-wins classifier
pub struct Classifier {
    rules: Vec<Rule>,
    fallback: String,
}

impl Classifier {
    /// Build from configuration; an empty rule list means the built-in taxonomy
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let rules = if config.rules.is_empty() {
            BUILTIN_RULES
                .iter()
                .map(|(tag, pattern)| (tag.to_string(), pattern.to_string()))
                .collect::<Vec<_>>()
        } else {
            config
                .rules
                .iter()
                .map(|r| (r.tag.clone(), r.pattern.clone()))
                .collect()
        };
        Self::new(rules, config.fallback.clone())
    }

    pub fn new(rules: Vec<(String, String)>, fallback: String) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(|(tag, pattern)| {
                Ok(Rule {
                    tag,
                    pattern: Regex::new(&pattern)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules, fallback })
    }

    /// Tag of the first rule matching `text`, or the fallback
    pub fn classify(&self, text: &str) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(text))
            .map(|rule| rule.tag.as_str())
            .unwrap_or(&self.fallback)
    }

    /// Classify a record from its chapter context and a bounded body prefix
    pub fn classify_record(&self, context: &str, body: &str, prefix_chars: usize) -> &str {
        let prefix: String = body.chars().take(prefix_chars).collect();
        let input = format!("{} {}", context, prefix);
        self.classify(&input)
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Tags in priority order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.tag.as_str())
    }
}
