use rand::Rng;

/// Performance band for the digest opening line, from yesterday's completion
/// count vs. what is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Clean,
    Zero,
    Meh,
    Good,
    Amazing,
}

/// Band selection, strict priority order: an empty board wins outright, then
/// the completion count decides.
pub fn band_for(completed: usize, remaining: usize) -> Band {
    if remaining == 0 {
        Band::Clean
    } else if completed == 0 {
        Band::Zero
    } else if completed == 1 {
        Band::Meh
    } else if completed > remaining {
        Band::Amazing
    } else {
        Band::Good
    }
}

const CLEAN_HOOKS: &[&str] = &[
    "🏆 הלוח נקי לגמרי! תהנו מהיום",
    "✨ אפס משימות פתוחות. כל הכבוד!",
    "🎉 הכל סגור. מגיע לכם פינוק",
];

const ZERO_HOOKS: &[&str] = &[
    "אתמול לא הושלם כלום... אולי היום? 💪",
    "יום חדש, הזדמנות חדשה לסמן ✅",
    "המשימות לא יסמנו את עצמן 😉",
];

const MEH_HOOKS: &[&str] = &[
    "משימה אחת ירדה אתמול. לאט אבל בטוח 🐢",
    "אחת הושלמה. ממשיכים! ✊",
    "התחלה צנועה — משימה אחת אתמול",
];

const GOOD_HOOKS: &[&str] = &[
    "קצב טוב! ממשיכים ככה 💪",
    "עבודה יפה אתמול. הלוח מתקצר 📉",
    "התקדמות נאה. עוד קצת ומנקים את הלוח",
];

const AMAZING_HOOKS: &[&str] = &[
    "וואו! סגרתם אתמול יותר ממה שנשאר 🔥",
    "קצב מטורף! הלוח כמעט ריק 🚀",
    "אלופים! יותר הושלמו מאשר נותרו 🏅",
];

fn variants(band: Band) -> &'static [&'static str] {
    match band {
        Band::Clean => CLEAN_HOOKS,
        Band::Zero => ZERO_HOOKS,
        Band::Meh => MEH_HOOKS,
        Band::Good => GOOD_HOOKS,
        Band::Amazing => AMAZING_HOOKS,
    }
}

/// Hook line source. Injectable so tests can pin the choice.
pub trait HookSource: Send + Sync {
    fn pick(&self, band: Band) -> String;
}

/// Production source: uniform choice among the band's variants.
#[derive(Default)]
pub struct RandomHooks;

impl HookSource for RandomHooks {
    fn pick(&self, band: Band) -> String {
        let pool = variants(band);
        let idx = rand::thread_rng().gen_range(0..pool.len());
        pool[idx].to_string()
    }
}

#[cfg(test)]
pub(crate) struct FixedHooks;

#[cfg(test)]
impl HookSource for FixedHooks {
    fn pick(&self, band: Band) -> String {
        format!("[{:?}]", band)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_priority_order() {
        assert_eq!(band_for(0, 5), Band::Zero);
        assert_eq!(band_for(1, 5), Band::Meh);
        assert_eq!(band_for(3, 2), Band::Amazing);
        assert_eq!(band_for(2, 5), Band::Good);
        assert_eq!(band_for(2, 2), Band::Good);
    }

    #[test]
    fn clean_wins_regardless_of_completed() {
        assert_eq!(band_for(0, 0), Band::Clean);
        assert_eq!(band_for(1, 0), Band::Clean);
        assert_eq!(band_for(7, 0), Band::Clean);
    }

    #[test]
    fn random_pick_stays_within_band_pool() {
        let hooks = RandomHooks;
        for _ in 0..20 {
            let line = hooks.pick(Band::Zero);
            assert!(ZERO_HOOKS.contains(&line.as_str()));
        }
    }
}
