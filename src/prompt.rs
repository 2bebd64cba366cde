//! Maps a [`GenerationRequest`] to the instruction text sent with each image.
//!
//! Total and deterministic: absent options contribute nothing, and the output
//! depends on nothing but the request.

use crate::models::{
    AcrylicStandOptions, AspectRatio, BackgroundOptions, BackgroundType, DisplayStandMaterial,
    DisplayStandOptions, DisplayStandShape, GenerationRequest, GenerationStyle, LineArtOptions,
    LineThickness, MetalType, MineralType, PackageOptions, PackagePosition, ThreeViewOptions,
    WoodType,
};

const SECTION_BREAK: &str = "\n\n";

pub fn base_prompt(style: GenerationStyle) -> &'static str {
    match style {
        GenerationStyle::Figure => "この画像をリアルなフィギュア・スタチュー風に変換してください。
以下の特徴を持つように生成してください：
- 実際のフィギュア製品のような質感
- PVCやレジン素材のような光沢感
- 立体的な造形を感じさせる陰影
- フィギュアの台座（ベース）を追加
- スタジオ撮影のような背景
- 高品質なフィギュア製品写真のような仕上がり",
        GenerationStyle::ThreeView => "この画像のキャラクターの三面図を生成してください。
以下の特徴を持つように生成してください：
- 正面、横（左または右）、後ろの3つの視点
- 同じキャラクターの統一されたデザイン
- 白または薄いグレーの背景
- キャラクターシートのような配置",
        GenerationStyle::AcrylicStand => "この画像をアクリルスタンド風に変換してください。
以下の特徴を持つように生成してください：
- アクリル素材の透明感
- スタンドの台座部分
- イラストのスタイルを維持
- クリアな輪郭線",
        GenerationStyle::LineArt => "この画像から線画を抽出してください。
以下の特徴を持つように生成してください：
- 色を除去し、線のみを残す
- クリーンでシャープな輪郭線
- 白い背景
- ベクター風の仕上がり",
        GenerationStyle::Free => "",
    }
}

const FIGURIZE_CLAUSE: &str = "フィギュア化指示:
- 三面図をフィギュア風の質感で生成
- PVCやレジン素材のような光沢感を持たせる
- 立体的な造形を感じさせる陰影を追加
- 高品質なフィギュア製品のような仕上がり";

const OUTLINE_CLAUSE: &str = "縁取りオプション:
- キャラクターの周囲に白い縁取りを追加
- アクリルスタンドらしいクリーンな仕上がり";

// --- Label tables ---

pub fn wood_label(wood: WoodType) -> &'static str {
    match wood {
        WoodType::Oak => "オーク",
        WoodType::DarkOak => "ダークオーク",
        WoodType::Walnut => "ウォールナット",
        WoodType::Maple => "メープル",
        WoodType::Cherry => "チェリー",
        WoodType::Mahogany => "マホガニー",
    }
}

pub fn metal_label(metal: MetalType) -> &'static str {
    match metal {
        MetalType::Gold => "ゴールド",
        MetalType::Silver => "シルバー",
        MetalType::Copper => "銅",
        MetalType::Chrome => "クローム",
        MetalType::Hairline => "ヘアライン",
        MetalType::RustyIron => "錆び鉄",
    }
}

pub fn mineral_label(mineral: MineralType) -> &'static str {
    match mineral {
        MineralType::Marble => "大理石",
        MineralType::Granite => "花崗岩",
        MineralType::Obsidian => "黒曜石",
        MineralType::Crystal => "水晶",
        MineralType::Ruby => "ルビー",
        MineralType::Emerald => "エメラルド",
        MineralType::Sapphire => "サファイア",
    }
}

pub fn background_label(kind: BackgroundType) -> &'static str {
    match kind {
        BackgroundType::None => "なし",
        BackgroundType::Studio => "スタジオ撮影風の背景",
        BackgroundType::Shop => "ショップディスプレイ風の背景",
        BackgroundType::Desktop => "デスクトップに置かれた雰囲気",
        BackgroundType::Diorama => "ジオラマ風の小さな世界",
        BackgroundType::Custom => "カスタム",
    }
}

pub fn shape_label(shape: DisplayStandShape) -> &'static str {
    match shape {
        DisplayStandShape::Circle => "円形",
        DisplayStandShape::Square => "四角形",
        DisplayStandShape::Hexagon => "六角形",
    }
}

pub fn thickness_label(thickness: LineThickness) -> &'static str {
    match thickness {
        LineThickness::Thin => "細め",
        LineThickness::Medium => "普通",
        LineThickness::Thick => "太め",
    }
}

// --- Section builders ---

fn bulleted(header: &str, parts: &[String]) -> Option<String> {
    if parts.is_empty() {
        return None;
    }
    Some(format!("{header}:\n- {}", parts.join("\n- ")))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn three_view_section(options: &ThreeViewOptions) -> Option<String> {
    options.figurize.then(|| FIGURIZE_CLAUSE.to_string())
}

fn acrylic_stand_section(options: &AcrylicStandOptions) -> Option<String> {
    options.has_outline.then(|| OUTLINE_CLAUSE.to_string())
}

fn line_art_section(options: &LineArtOptions) -> String {
    format!("線の太さ: {}の線で描画", thickness_label(options.thickness))
}

fn aspect_ratio_section(ratio: Option<AspectRatio>) -> Option<String> {
    match ratio {
        Some(r) if r != AspectRatio::Auto => Some(format!("アスペクト比: {}", r.as_str())),
        _ => None,
    }
}

fn package_section(options: &PackageOptions) -> Option<String> {
    let mut parts = Vec::new();
    match options.position {
        PackagePosition::None => return None,
        PackagePosition::Beside => parts.push("パッケージを横に並べて表示".to_string()),
        PackagePosition::Inside => parts.push("パッケージの中に収められた状態で表示".to_string()),
    }
    if let Some(text) = non_empty(&options.text) {
        parts.push(format!("パッケージに「{text}」というテキスト"));
    }
    if let Some(logo) = non_empty(&options.logo_text) {
        parts.push(format!("「{logo}」のロゴ"));
    }
    if options.has_texture {
        parts.push("パッケージにリアルなテクスチャ（印刷の質感、箱の折り目など）".to_string());
    }
    bulleted("パッケージ", &parts)
}

fn display_stand_section(options: &DisplayStandOptions) -> Option<String> {
    if !options.enabled {
        return None;
    }
    let mut parts = vec![format!("{}の展示台", shape_label(options.shape))];

    let material = match options.material {
        DisplayStandMaterial::Gaming => {
            if options.is_rainbow.unwrap_or(false) {
                Some("レインボーに光るLED（ゲーミング風）".to_string())
            } else {
                non_empty(&options.color).map(|color| format!("{color}色に光るLED"))
            }
        }
        DisplayStandMaterial::Wood => {
            options.wood_type.map(|w| format!("木材（{}）製", wood_label(w)))
        }
        DisplayStandMaterial::Metal => {
            options.metal_type.map(|m| format!("金属（{}）製", metal_label(m)))
        }
        DisplayStandMaterial::Mineral => {
            options.mineral_type.map(|m| format!("鉱物（{}）製", mineral_label(m)))
        }
        DisplayStandMaterial::Custom => non_empty(&options.custom_description).map(str::to_string),
    };
    parts.extend(material);

    bulleted("展示台", &parts)
}

fn background_section(options: &BackgroundOptions) -> Option<String> {
    if !options.enabled {
        return None;
    }
    let part = match options.kind {
        BackgroundType::None => None,
        BackgroundType::Custom => non_empty(&options.custom_description).map(str::to_string),
        other => Some(background_label(other).to_string()),
    };
    bulleted("背景", &part.into_iter().collect::<Vec<_>>())
}

/// Builds the full prompt. Sections appear in a fixed order and are joined by blank lines.
pub fn build_prompt(request: &GenerationRequest) -> String {
    let mut sections: Vec<String> = Vec::new();

    let base = match request.style {
        GenerationStyle::Free => non_empty(&request.custom_prompt).unwrap_or_default(),
        style => base_prompt(style),
    };
    if !base.is_empty() {
        sections.push(base.to_string());
    }

    match request.style {
        GenerationStyle::ThreeView => {
            sections.extend(request.three_view_options.as_ref().and_then(three_view_section));
        }
        GenerationStyle::AcrylicStand => {
            sections.extend(request.acrylic_stand_options.as_ref().and_then(acrylic_stand_section));
        }
        GenerationStyle::LineArt => {
            sections.push(line_art_section(&request.line_art_options.unwrap_or_default()));
        }
        GenerationStyle::Figure | GenerationStyle::Free => {}
    }

    sections.extend(aspect_ratio_section(request.aspect_ratio));
    sections.extend(request.package_options.as_ref().and_then(package_section));
    sections.extend(request.display_stand_options.as_ref().and_then(display_stand_section));
    sections.extend(request.background_options.as_ref().and_then(background_section));

    sections.join(SECTION_BREAK)
}
