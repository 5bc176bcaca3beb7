//! Built-in reference dataset
//!
//! Static vocabulary used to assemble the 384 line states when no JSON file
//! is configured. Weights come from `[scoring]`; only words live here.

/// The 64 hexagram names in King Wen order
pub const HEXAGRAM_NAMES: [&str; 64] = [
    "乾為天", "坤為地", "水雷屯", "山水蒙", "水天需", "天水訟", "地水師", "水地比",
    "風天小畜", "天澤履", "地天泰", "天地否", "天火同人", "火天大有", "地山謙", "雷地豫",
    "澤雷随", "山風蠱", "地澤臨", "風地観", "火雷噬嗑", "山火賁", "山地剝", "地雷復",
    "天雷無妄", "山天大畜", "山雷頤", "澤風大過", "坎為水", "離為火", "澤山咸", "雷風恒",
    "天山遯", "雷天大壯", "火地晋", "地火明夷", "風火家人", "火澤睽", "水山蹇", "雷水解",
    "山澤損", "風雷益", "澤天夬", "天風姤", "澤地萃", "地風升", "澤水困", "水風井",
    "澤火革", "火風鼎", "震為雷", "艮為山", "風山漸", "雷澤歸妹", "雷火豊", "火山旅",
    "巽為風", "兌為澤", "風水渙", "水澤節", "風澤中孚", "雷山小過", "水火既済", "火水未済",
];

/// Ordinal labels for line positions 1-6
pub const POSITION_LABELS: [&str; 6] = ["初爻", "二爻", "三爻", "四爻", "五爻", "上爻"];

/// Keywords shared by every line at a position
pub const POSITION_KEYWORDS: [&[&str]; 6] = [
    &["始動", "潜在", "基礎", "初心", "萌芽", "開始", "準備"],
    &["内面", "協力", "蓄積", "忍耐", "育成", "関係", "支援"],
    &["困難", "試練", "過渡期", "不安定", "成長", "挑戦"],
    &["外界", "関門", "進退", "決断", "境界", "変化", "転換"],
    &["中正", "君位", "成就", "権威", "責任", "リーダー", "統率"],
    &["極限", "終焉", "転換", "過剰", "変革", "完成", "結果"],
];

/// Cue words implying a position; also used for the position hint
///
/// Lists are kept near equal length. The first `CUES_PER_LINE` of each list
/// also go into that position's keyword sets.
pub const POSITION_CUES: [&[&str]; 6] = [
    &["始", "新", "初", "基礎", "準備", "第一歩", "着手", "スタート", "開始", "萌芽"],
    &["協力", "関係", "内面", "相談", "支援", "育成", "忍耐", "蓄積", "仲間"],
    &["困難", "試練", "挑戦", "問題", "過渡期", "不安定", "苦労", "危機"],
    &["変化", "転換", "決断", "外部", "環境", "選択", "岐路", "関門", "進退", "境界"],
    &["リーダーシップ", "決断", "成熟", "リーダー", "統率", "指導", "権威", "君位", "責任", "中正"],
    &["完成", "終了", "極限", "最終", "完了", "結果", "終焉", "過剰", "引退", "結末"],
];

/// Cue words per position copied into each line's keyword set
pub const CUES_PER_LINE: usize = 3;

/// Trigram symbol characters with their associated keywords
pub const TRIGRAM_KEYWORDS: [(char, &[&str]); 8] = [
    ('天', &["天", "創造", "剛健", "父", "積極"]),
    ('地', &["地", "受容", "柔順", "母", "包容"]),
    ('雷', &["雷", "震動", "奮起", "長男", "行動"]),
    ('水', &["水", "険難", "智恵", "中男", "流動"]),
    ('山', &["山", "静止", "停止", "少男", "安定"]),
    ('風', &["風", "浸透", "謙遜", "長女", "伝達"]),
    ('火', &["火", "明知", "美麗", "中女", "情熱"]),
    ('澤', &["澤", "喜悦", "交流", "少女", "和楽"]),
];

/// Theme words per hexagram (index 0 = hexagram 1)
pub const HEXAGRAM_THEMES: [&[&str]; 64] = [
    &["創造", "強健", "剛毅"],
    &["受容", "柔順", "包容"],
    &["困難", "生成", "開拓"],
    &["啓蒙", "学習", "未熟"],
    &["待機", "忍耐", "信頼"],
    &["争い", "訴訟", "対立"],
    &["統率", "規律", "組織"],
    &["親和", "協調", "結束"],
    &["抑制", "小さな蓄積", "準備"],
    &["礼節", "慎重", "実践"],
    &["調和", "繁栄", "交流"],
    &["閉塞", "停滞", "隔絶"],
    &["同志", "協力", "共同"],
    &["豊かさ", "所有", "繁栄"],
    &["謙虚", "謙遜", "節度"],
    &["喜び", "熱意", "予備"],
    &["追随", "適応", "随順"],
    &["刷新", "改革", "修復"],
    &["接近", "成長", "臨場"],
    &["観察", "洞察", "省察"],
    &["裁き", "障害除去", "決着"],
    &["装飾", "美", "文化"],
    &["剥落", "衰退", "崩壊"],
    &["回復", "復活", "再生"],
    &["無邪気", "誠実", "自然"],
    &["大きな蓄積", "蓄え", "修養"],
    &["養い", "健康", "節制"],
    &["過重", "重圧", "非常"],
    &["危険", "深淵", "洞察"],
    &["明晰", "照明", "文明"],
    &["感応", "恋愛", "共感"],
    &["恒常", "持続", "継続"],
    &["退避", "撤退", "隠遁"],
    &["強大", "勢い", "威力"],
    &["進歩", "昇進", "前進"],
    &["隠忍", "闇", "自重"],
    &["家族", "家庭", "内助"],
    &["相違", "乖離", "反目"],
    &["障害", "足止め", "難局"],
    &["解放", "解決", "緩和"],
    &["減少", "節約", "損失"],
    &["増加", "利益", "拡大"],
    &["決意", "排除", "決行"],
    &["出会い", "遭遇", "邂逅"],
    &["集合", "結集", "団結"],
    &["上昇", "向上", "昇格"],
    &["困窮", "苦境", "窮地"],
    &["源泉", "供給", "井戸"],
    &["変革", "革命", "改新"],
    &["鼎", "養成", "安泰"],
    &["震動", "覚醒", "始動"],
    &["静止", "瞑想", "安定"],
    &["漸進", "段階", "発展"],
    &["結婚", "従属", "帰属"],
    &["豊満", "盛大", "絶頂期"],
    &["旅", "流浪", "移動"],
    &["浸透", "柔軟", "従順"],
    &["喜悦", "交流", "説得"],
    &["分散", "解散", "拡散"],
    &["節度", "節制", "制限"],
    &["真心", "信頼", "誠意"],
    &["小さな過ち", "謙虚", "慎重"],
    &["完成", "成就", "達成"],
    &["未完成", "可能性", "移行"],
];

/// Phrases unique to a single line: (hexagram_id, line_position, phrase)
pub const SPECIAL_PHRASES: [(u8, u8, &str); 6] = [
    (1, 5, "飛龍在天"),
    (1, 6, "亢龍有悔"),
    (11, 5, "大いなる調和"),
    (12, 1, "閉塞の兆し"),
    (63, 6, "完成後の警戒"),
    (64, 1, "新たな始まりの予感"),
];

/// Extra feature weights for significant terms (default weight is 1.0)
pub const DICTIONARY_WEIGHTS: [(&str, f64); 24] = [
    ("乾", 2.0),
    ("坤", 2.0),
    ("震", 2.0),
    ("巽", 2.0),
    ("坎", 2.0),
    ("離", 2.0),
    ("艮", 2.0),
    ("兌", 2.0),
    ("初", 1.8),
    ("二", 1.8),
    ("三", 1.8),
    ("四", 1.8),
    ("五", 1.8),
    ("上", 1.8),
    ("九", 1.5),
    ("六", 1.5),
    ("龍", 2.5),
    ("飛", 2.0),
    ("吉", 2.0),
    ("凶", 2.0),
    ("悔", 1.8),
    ("咎", 1.8),
    ("利", 1.8),
    ("貞", 1.8),
];

/// Tokens dropped by the regex tokenizer
pub const STOPWORDS: [&str; 23] = [
    "の", "に", "は", "を", "た", "が", "で", "て", "と", "し", "れ", "さ", "ある", "いる", "も",
    "する", "から", "な", "こと", "として", "い", "や", "れる",
];
