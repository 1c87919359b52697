// 该文件是 Xindian （心电） 项目的一部分。
// src/leads.rs - 导联区域切分
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

use std::ops::Range;

use image::imageops::crop_imm;

use crate::frame::{EcgCanvas, GrayImageF32};

/// 每张图中切出的面板数量（12 个导联 + 1 条节律条）
pub const PANEL_COUNT: usize = 13;
/// 参与特征提取的导联数量
pub const LEAD_COUNT: usize = 12;

/// 画布上的一个矩形区域，行列均为左闭右开
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadRegion {
  pub rows: Range<u32>,
  pub cols: Range<u32>,
}

impl LeadRegion {
  const fn new(rows: Range<u32>, cols: Range<u32>) -> Self {
    Self { rows, cols }
  }

  pub fn height(&self) -> u32 {
    self.rows.end - self.rows.start
  }

  pub fn width(&self) -> u32 {
    self.cols.end - self.cols.start
  }
}

const ROW_1: Range<u32> = 300..600;
const ROW_2: Range<u32> = 600..900;
const ROW_3: Range<u32> = 900..1200;
const COL_1: Range<u32> = 150..643;
const COL_2: Range<u32> = 646..1135;
const COL_3: Range<u32> = 1140..1625;
const COL_4: Range<u32> = 1630..2125;

/// 标准打印版 12 导联心电图的版面（3 行 x 4 列 + 底部节律条），
/// 是输入格式的标定常量
pub static LEAD_LAYOUT: [LeadRegion; PANEL_COUNT] = [
  LeadRegion::new(ROW_1, COL_1),
  LeadRegion::new(ROW_1, COL_2),
  LeadRegion::new(ROW_1, COL_3),
  LeadRegion::new(ROW_1, COL_4),
  LeadRegion::new(ROW_2, COL_1),
  LeadRegion::new(ROW_2, COL_2),
  LeadRegion::new(ROW_2, COL_3),
  LeadRegion::new(ROW_2, COL_4),
  LeadRegion::new(ROW_3, COL_1),
  LeadRegion::new(ROW_3, COL_2),
  LeadRegion::new(ROW_3, COL_3),
  LeadRegion::new(ROW_3, COL_4),
  LeadRegion::new(1250..1480, 150..2125),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
  Lead,
  Rhythm,
}

/// 从画布上切出的一个导联面板
#[derive(Debug, Clone)]
pub struct LeadPanel {
  /// 从 1 开始的面板编号
  pub number: usize,
  pub kind: PanelKind,
  pub image: GrayImageF32,
}

/// 按固定版面把画布切成 13 个面板，顺序固定
pub fn divide_leads(canvas: &EcgCanvas) -> [LeadPanel; PANEL_COUNT] {
  std::array::from_fn(|i| {
    let region = &LEAD_LAYOUT[i];
    let image = crop_imm(
      canvas.as_image(),
      region.cols.start,
      region.rows.start,
      region.width(),
      region.height(),
    )
    .to_image();

    LeadPanel {
      number: i + 1,
      kind: if i < LEAD_COUNT {
        PanelKind::Lead
      } else {
        PanelKind::Rhythm
      },
      image,
    }
  })
}
