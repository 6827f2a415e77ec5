// 视口观察器 - 懒加载的触发条件
//
// 元素注册后，视口（外扩 root_margin_px）与元素的相交面积占元素面积的比例
// 达到 threshold 时视为相交。触发是一次性的：相交后元素即被注销。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::ObserverSettings;

/// 矩形区域（页面坐标）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// 四周各外扩 margin
    pub fn inflate(&self, margin: f64) -> Rect {
        Rect {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + margin * 2.0,
            height: self.height + margin * 2.0,
        }
    }

    /// 相交区域，不相交时返回 None（边缘接触视为相交，面积为 0）
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);

        if right < left || bottom < top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

/// 被观察的元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedElement {
    pub id: String,
    pub bounds: Rect,
    /// 元素上声明的延迟加载地址
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_src: Option<String>,
}

impl ObservedElement {
    pub fn new(id: impl Into<String>, bounds: Rect) -> Self {
        Self {
            id: id.into(),
            bounds,
            data_src: None,
        }
    }

    pub fn with_data_src(mut self, src: impl Into<String>) -> Self {
        self.data_src = Some(src.into());
        self
    }
}

/// 从元素中取出要加载的地址
pub type LocationExtractor = Arc<dyn Fn(&ObservedElement) -> Option<String> + Send + Sync>;

/// 默认提取器：读取 data_src
pub fn data_src_extractor() -> LocationExtractor {
    Arc::new(|element: &ObservedElement| element.data_src.clone())
}

struct ObservedTarget {
    element: ObservedElement,
    extractor: LocationExtractor,
}

/// 视口观察器
pub struct ViewportObserver {
    settings: ObserverSettings,
    targets: HashMap<String, ObservedTarget>,
}

impl ViewportObserver {
    pub fn new(settings: ObserverSettings) -> Self {
        Self {
            settings,
            targets: HashMap::new(),
        }
    }

    /// 注册元素，同 ID 的旧注册会被替换
    pub fn observe(&mut self, element: ObservedElement, extractor: LocationExtractor) {
        self.targets
            .insert(element.id.clone(), ObservedTarget { element, extractor });
    }

    pub fn unobserve(&mut self, id: &str) -> bool {
        self.targets.remove(id).is_some()
    }

    /// 更新元素位置（布局变化后调用）
    pub fn update_bounds(&mut self, id: &str, bounds: Rect) -> bool {
        match self.targets.get_mut(id) {
            Some(target) => {
                target.element.bounds = bounds;
                true
            }
            None => false,
        }
    }

    pub fn is_observing(&self, id: &str) -> bool {
        self.targets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// 注销全部元素
    pub fn disconnect(&mut self) {
        self.targets.clear();
    }

    /// 计算与视口相交的元素，注销它们并返回 (元素, 提取出的地址)
    pub fn take_intersecting(&mut self, viewport: Rect) -> Vec<(ObservedElement, Option<String>)> {
        let root = viewport.inflate(self.settings.root_margin_px);

        let mut hits: Vec<String> = self
            .targets
            .values()
            .filter(|target| self.is_visible_enough(&target.element.bounds, &root))
            .map(|target| target.element.id.clone())
            .collect();
        hits.sort();

        hits.into_iter()
            .filter_map(|id| self.targets.remove(&id))
            .map(|target| {
                let location = (target.extractor)(&target.element);
                (target.element, location)
            })
            .collect()
    }

    fn is_visible_enough(&self, bounds: &Rect, root: &Rect) -> bool {
        let Some(overlap) = bounds.intersection(root) else {
            return false;
        };

        let area = bounds.area();
        if area <= 0.0 {
            // 零面积元素：接触即视为完全可见
            return true;
        }
        overlap.area() / area >= self.settings.threshold
    }
}

impl fmt::Debug for ViewportObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewportObserver")
            .field("settings", &self.settings)
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .finish()
    }
}
