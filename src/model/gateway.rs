// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/gateway.rs - 模型网关（单飞加载）
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

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{DetectionModel, InferenceError, ModelLoadError, ModelLoader};
use crate::detection::RawPrediction;
use crate::input::Bitmap;

type LoadOutcome<M> = Result<Arc<M>, Arc<ModelLoadError>>;
type OutcomeSender<M> = watch::Sender<Option<LoadOutcome<M>>>;
type OutcomeReceiver<M> = watch::Receiver<Option<LoadOutcome<M>>>;

#[derive(Error, Debug)]
pub enum GatewayError {
  #[error(transparent)]
  Load(Arc<ModelLoadError>),
  #[error(transparent)]
  Inference(#[from] InferenceError),
}

enum Slot<M> {
  Empty,
  Loading(OutcomeReceiver<M>),
  Loaded(Arc<M>),
}

enum Role<M> {
  Leader(OutcomeSender<M>),
  Follower(OutcomeReceiver<M>),
  Done(Arc<M>),
}

/// 加载中的占位；负责加载的调用方中途被取消时把状态退回 `Empty`
struct LoadingGuard<'a, M> {
  slot: &'a Mutex<Slot<M>>,
  armed: bool,
}

impl<M> LoadingGuard<'_, M> {
  fn finish(mut self, next: Slot<M>) {
    *self.slot.lock() = next;
    self.armed = false;
  }
}

impl<M> Drop for LoadingGuard<'_, M> {
  fn drop(&mut self) {
    if self.armed {
      *self.slot.lock() = Slot::Empty;
    }
  }
}

/// 模型网关
///
/// 模型在第一次检测请求时才加载，之后一直复用。同一时刻至多只有一次加载在进行：
/// 加载期间到达的请求等待同一个结果。加载失败不会被缓存，下一次请求会重新加载。
/// 加载完成后的检测调用之间不做串行化。
pub struct ModelGateway<L: ModelLoader> {
  loader: L,
  slot: Mutex<Slot<L::Model>>,
  load_attempts: AtomicUsize,
}

impl<L: ModelLoader> ModelGateway<L> {
  pub fn new(loader: L) -> Self {
    Self {
      loader,
      slot: Mutex::new(Slot::Empty),
      load_attempts: AtomicUsize::new(0),
    }
  }

  pub fn loader(&self) -> &L {
    &self.loader
  }

  pub fn is_loaded(&self) -> bool {
    matches!(&*self.slot.lock(), Slot::Loaded(_))
  }

  /// 已经发起过的加载次数（含失败的）
  pub fn load_attempts(&self) -> usize {
    self.load_attempts.load(Ordering::SeqCst)
  }

  pub async fn ensure_loaded(&self) -> Result<Arc<L::Model>, Arc<ModelLoadError>> {
    loop {
      let role = {
        let mut slot = self.slot.lock();
        match &*slot {
          Slot::Loaded(model) => Role::Done(model.clone()),
          Slot::Loading(rx) => Role::Follower(rx.clone()),
          Slot::Empty => {
            let (tx, rx) = watch::channel(None);
            *slot = Slot::Loading(rx);
            Role::Leader(tx)
          }
        }
      };

      match role {
        Role::Done(model) => return Ok(model),
        Role::Leader(tx) => return self.lead_load(tx).await,
        Role::Follower(mut rx) => {
          debug!("模型正在加载，等待同一次加载结果");
          let shared = rx
            .wait_for(Option::is_some)
            .await
            .map(|outcome| (*outcome).clone());
          match shared {
            Ok(Some(outcome)) => return outcome,
            _ => warn!("负责加载的请求已取消，重新发起加载"),
          }
        }
      }
    }
  }

  async fn lead_load(&self, tx: OutcomeSender<L::Model>) -> LoadOutcome<L::Model> {
    let guard = LoadingGuard {
      slot: &self.slot,
      armed: true,
    };

    let attempt = self.load_attempts.fetch_add(1, Ordering::SeqCst) + 1;
    info!("正在加载模型（第 {} 次）...", attempt);
    let now = Instant::now();

    let outcome = match self.loader.load().await {
      Ok(model) => {
        info!("模型加载完成，耗时: {:.2?}", now.elapsed());
        Ok(Arc::new(model))
      }
      Err(err) => {
        error!("模型加载失败: {}", err);
        Err(Arc::new(err))
      }
    };

    let next = match &outcome {
      Ok(model) => Slot::Loaded(model.clone()),
      Err(_) => Slot::Empty,
    };
    guard.finish(next);
    tx.send_replace(Some(outcome.clone()));

    outcome
  }

  pub async fn detect(&self, bitmap: &Bitmap) -> Result<Vec<RawPrediction>, GatewayError> {
    let model = self.ensure_loaded().await.map_err(GatewayError::Load)?;

    let now = Instant::now();
    let predictions = model.detect(bitmap).await?;
    info!(
      "推理完成，{} 个结果，耗时: {:.2?}",
      predictions.len(),
      now.elapsed()
    );

    Ok(predictions)
  }
}
