/// バイト単位のラベル（format_size のデフォルト）
pub const SIZES: &[&str] = &["bytes", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// 省略形のラベル
pub const SIZES_ABBRV: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// 幅をそろえた省略形のラベル（プログレス表示用）
pub const SIZES_ALIGNED_ABBRV: &[&str] = &[" B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// 転送レートのラベル
pub const TRANSMISSION_RATES: &[&str] = &[
    "bps", "Kbps", "Mbps", "Gbps", "Tbps", "Pbps", "Ebps", "Zbps", "Ybps",
];

/// バイトサイズを人間が読みやすい形式に変換
///
/// ```
/// use kura_core::utils::format_size;
///
/// assert_eq!(format_size(1_023), "1,023 bytes");
/// assert_eq!(format_size(1_024), "1.00 KB");
/// assert_eq!(format_size(15_000), "14.6 KB");
/// assert_eq!(format_size(150_000), "146 KB");
/// assert_eq!(format_size(1_024_000), "0.97 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    format_size_with(bytes, SIZES, 1024)
}

/// 丸めずにバイト数をそのまま表示（3 桁ごとにカンマ）
///
/// ```
/// use kura_core::utils::format_bytes_exact;
///
/// assert_eq!(format_bytes_exact(2_500), "2,500 bytes");
/// ```
pub fn format_bytes_exact(bytes: u64) -> String {
    format!("{} {}", group_thousands(&bytes.to_string()), SIZES[0])
}

/// ラベルと単位の大きさを指定してサイズを整形
///
/// 最小単位に収まる値は丸めずにそのまま表示する。それ以外は有効数字 3 桁に
/// 切り捨てる（四捨五入はしない）。
pub fn format_size_with(size: u64, units: &[&str], unit_size: u64) -> String {
    debug_assert!(!units.is_empty());

    if size < unit_size {
        return format!("{} {}", group_thousands(&size.to_string()), units[0]);
    }

    // unit_size ではなく 1000 と比較して、整数部が 3 桁を超えないようにする
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit + 1 < units.len() {
        value /= unit_size as f64;
        unit += 1;
    }

    let decimals: usize = if value < 10.0 {
        2
    } else if value < 100.0 {
        1
    } else {
        0
    };

    let scale = 10_f64.powi(decimals as i32);
    let floored = (value * scale).floor() / scale;

    format!(
        "{} {}",
        group_thousands(&format!("{:.*}", decimals, floored)),
        units[unit]
    )
}

/// 整数部に 3 桁ごとのカンマを挿入
fn group_thousands(number: &str) -> String {
    let (integer, fraction) = match number.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (number, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match fraction {
        Some(f) => format!("{}.{}", grouped, f),
        None => grouped,
    }
}
