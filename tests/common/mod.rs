// 测试用的脚本化资源获取器
//
// 每个地址可以预设一串步骤，用完后使用默认步骤；
// 记录每次调用的时间和同时进行的获取数量

#![allow(dead_code)]

use async_trait::async_trait;
use media_preload_backend::services::preload::{
    FetchError, FetchedResource, ProgressFn, ResourceFetcher,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// 单次获取的行为
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// 延迟后成功
    Succeed(Duration),
    /// 延迟后失败
    Fail(Duration),
}

pub struct ScriptedFetcher {
    default: Step,
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<(String, Instant)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedFetcher {
    pub fn new(default: Step) -> Arc<Self> {
        Arc::new(Self {
            default,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }

    /// 立即成功的获取器
    pub fn instant() -> Arc<Self> {
        Self::new(Step::Succeed(Duration::ZERO))
    }

    pub fn script(&self, location: &str, steps: Vec<Step>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(location.to_string(), steps.into());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, location: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| l == location)
            .map(|(_, at)| *at)
            .collect()
    }

    /// 按调用顺序排列的地址
    pub fn call_order(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(l, _)| l.clone()).collect()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn next_step(&self, location: &str) -> Step {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(location)
            .and_then(VecDeque::pop_front)
            .unwrap_or(self.default)
    }
}

#[async_trait]
impl ResourceFetcher for ScriptedFetcher {
    async fn fetch(&self, location: &str, progress: ProgressFn) -> Result<FetchedResource, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((location.to_string(), Instant::now()));
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        match self.next_step(location) {
            Step::Succeed(delay) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                progress(100);
                Ok(FetchedResource::from_bytes(
                    location.as_bytes().to_vec(),
                    Some("image/webp".to_string()),
                ))
            }
            Step::Fail(delay) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Err(FetchError::HttpStatus(500))
            }
        }
    }
}
