// 该文件是 Kanjian （看见） 项目的一部分。
// src/color.rs - 类别配色
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::fmt;

use image::Rgb;
use serde::{Serialize, Serializer};

/// 固定调色板
pub const PALETTE: [ClassColor; 10] = [
  ClassColor([0xFF, 0x63, 0x84]),
  ClassColor([0x36, 0xA2, 0xEB]),
  ClassColor([0xFF, 0xCE, 0x56]),
  ClassColor([0x4B, 0xC0, 0xC0]),
  ClassColor([0x99, 0x66, 0xFF]),
  ClassColor([0xFF, 0x9F, 0x40]),
  ClassColor([0x80, 0x80, 0x80]),
  ClassColor([0x00, 0xFF, 0xFF]),
  ClassColor([0xFF, 0x00, 0xFF]),
  ClassColor([0xFF, 0xFF, 0x00]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassColor(pub [u8; 3]);

impl ClassColor {
  pub fn rgb(self) -> Rgb<u8> {
    Rgb(self.0)
  }
}

impl fmt::Display for ClassColor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let [r, g, b] = self.0;
    write!(f, "#{:02X}{:02X}{:02X}", r, g, b)
  }
}

impl Serialize for ClassColor {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// 类别名的 32 位滚动哈希（h = c + h * 31，按 UTF-16 码元）
///
/// 只在移位时截断到 32 位。结果只取决于字符串本身，跨会话、跨进程不变。
fn class_hash(name: &str) -> i64 {
  name.encode_utf16().fold(0i64, |hash, unit| {
    let shifted = (hash as i32).wrapping_shl(5) as i64;
    unit as i64 + shifted - hash
  })
}

/// 类别对应的颜色
pub fn color_for_class(name: &str) -> ClassColor {
  let index = (class_hash(name).unsigned_abs() % PALETTE.len() as u64) as usize;
  PALETTE[index]
}
