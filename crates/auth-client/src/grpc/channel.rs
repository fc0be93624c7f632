//! 인증 서비스 채널
//!
//! 백엔드 주소마다 tonic 채널을 하나씩 두고 요청을 라운드 로빈으로 분배한다.
//! facade와 모든 클라이언트 핸들은 같은 백엔드 목록을 공유하므로
//! `shutdown` 한 번으로 전체 연결이 해제되고 이후 요청은 거부된다.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

use http::{Request, Response};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::task::JoinHandle;
use tonic::body::Body;
use tonic::transport::Channel;
use tower::Service;
use tracing::{debug, warn};

use super::dialer::BoxError;

/// 채널 상태 에러
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("연결이 종료됨")]
    Closed,

    #[error("사용 가능한 백엔드 없음")]
    NoBackends,

    #[error("poll_ready 없이 call 호출")]
    NotReady,
}

#[derive(Clone)]
struct Backend {
    /// 주소 해석으로 추가된 백엔드만 주소를 가진다
    addr: Option<SocketAddr>,
    channel: Channel,
}

/// 첫 주소 해석 대기
#[derive(Default)]
struct Resolution {
    done: bool,
    waiters: Vec<Waker>,
}

#[derive(Default)]
struct Shared {
    backends: RwLock<Vec<Backend>>,
    next: AtomicUsize,
    closed: AtomicBool,
    resolution: Mutex<Resolution>,
    refresher: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn with_backends(backends: Vec<Backend>) -> Self {
        Self {
            backends: RwLock::new(backends),
            next: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            resolution: Mutex::new(Resolution {
                done: true,
                waiters: Vec::new(),
            }),
            refresher: Mutex::new(None),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn pick(&self) -> Option<Channel> {
        let backends = self.backends.read();
        if backends.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % backends.len();
        Some(backends[index].channel.clone())
    }

    fn poll_pick(&self, cx: &mut Context<'_>) -> Poll<Result<Channel, ChannelError>> {
        if self.is_closed() {
            return Poll::Ready(Err(ChannelError::Closed));
        }
        if let Some(channel) = self.pick() {
            return Poll::Ready(Ok(channel));
        }

        // 갱신/종료와 경합하지 않도록 대기 등록 전에 락 안에서 다시 확인
        let mut resolution = self.resolution.lock();
        if self.is_closed() {
            return Poll::Ready(Err(ChannelError::Closed));
        }
        if let Some(channel) = self.pick() {
            return Poll::Ready(Ok(channel));
        }
        if resolution.done {
            return Poll::Ready(Err(ChannelError::NoBackends));
        }
        resolution.waiters.push(cx.waker().clone());
        Poll::Pending
    }

    fn finish_resolution(&self) {
        let waiters = {
            let mut resolution = self.resolution.lock();
            resolution.done = true;
            std::mem::take(&mut resolution.waiters)
        };
        for waker in waiters {
            waker.wake();
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.refresher.get_mut().take() {
            handle.abort();
        }
    }
}

/// 인증 서비스 채널
///
/// 복제본은 백엔드 목록을 공유한다. 백엔드가 아직 해석되지 않았으면
/// 요청은 첫 해석이 끝날 때까지 대기한다.
pub struct AuthChannel {
    shared: Arc<Shared>,
    picked: Option<Channel>,
}

impl AuthChannel {
    /// 이미 만들어진 tonic 채널 하나로 구성
    pub fn from_channel(channel: Channel) -> Self {
        Self::from_shared(Shared::with_backends(vec![Backend {
            addr: None,
            channel,
        }]))
    }

    /// 연결된 백엔드 목록으로 구성
    pub(crate) fn connected(backends: Vec<(SocketAddr, Channel)>) -> Self {
        Self::from_shared(Shared::with_backends(
            backends
                .into_iter()
                .map(|(addr, channel)| Backend {
                    addr: Some(addr),
                    channel,
                })
                .collect(),
        ))
    }

    /// 주소 해석 전 빈 채널
    pub(crate) fn unresolved() -> Self {
        Self::from_shared(Shared::default())
    }

    fn from_shared(shared: Shared) -> Self {
        Self {
            shared: Arc::new(shared),
            picked: None,
        }
    }

    /// 백엔드 갱신 핸들 (채널을 살려두지 않는다)
    pub(crate) fn updater(&self) -> BackendUpdater {
        BackendUpdater {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// 주소 갱신 태스크 등록 (shutdown 시 중단)
    pub(crate) fn attach_refresher(&self, handle: JoinHandle<()>) {
        if self.shared.is_closed() {
            handle.abort();
            return;
        }
        if let Some(previous) = self.shared.refresher.lock().replace(handle) {
            previous.abort();
        }
    }

    /// 현재 백엔드 수
    pub fn backend_count(&self) -> usize {
        self.shared.backends.read().len()
    }

    /// 종료 여부
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// 연결 해제
    ///
    /// 주소 갱신을 멈추고 모든 백엔드 채널을 놓는다. 이후 모든 복제본의
    /// 요청은 `ChannelError::Closed`로 실패한다. 두 번째 호출은 아무것도 하지 않는다.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(handle) = self.shared.refresher.lock().take() {
            handle.abort();
        }

        let released = std::mem::take(&mut *self.shared.backends.write());
        debug!(backends = released.len(), "채널 해제");
        drop(released);

        self.shared.finish_resolution();
    }
}

impl Clone for AuthChannel {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            picked: None,
        }
    }
}

impl fmt::Debug for AuthChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthChannel")
            .field("backends", &self.backend_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Service<Request<Body>> for AuthChannel {
    type Response = Response<Body>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.shared.is_closed() {
            self.picked = None;
            return Poll::Ready(Err(ChannelError::Closed.into()));
        }

        if self.picked.is_none() {
            match self.shared.poll_pick(cx) {
                Poll::Ready(Ok(channel)) => self.picked = Some(channel),
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e.into())),
                Poll::Pending => return Poll::Pending,
            }
        }

        match self.picked.as_mut() {
            Some(channel) => channel.poll_ready(cx).map_err(BoxError::from),
            None => Poll::Ready(Err(ChannelError::NotReady.into())),
        }
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        match self.picked.take() {
            Some(mut channel) => {
                let response = channel.call(request);
                Box::pin(async move { response.await.map_err(BoxError::from) })
            }
            None => {
                let error: BoxError = ChannelError::NotReady.into();
                Box::pin(std::future::ready(Err::<Self::Response, BoxError>(error)))
            }
        }
    }
}

/// 주소 해석 결과를 채널에 반영하는 핸들
pub(crate) struct BackendUpdater {
    shared: Weak<Shared>,
}

impl BackendUpdater {
    /// 해석된 주소로 백엔드 목록 교체
    ///
    /// 기존 주소의 채널은 유지하고 새 주소만 `connect`로 만든다.
    /// 채널이 닫혔거나 모든 핸들이 사라졌으면 false.
    pub(crate) fn update<F>(&self, addrs: &[SocketAddr], mut connect: F) -> bool
    where
        F: FnMut(SocketAddr) -> Result<Channel, BoxError>,
    {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };

        {
            let mut backends = shared.backends.write();
            if shared.is_closed() {
                return false;
            }

            let mut next = Vec::with_capacity(addrs.len());
            let mut added = 0usize;
            for addr in addrs {
                if let Some(existing) = backends.iter().find(|b| b.addr == Some(*addr)) {
                    next.push(existing.clone());
                    continue;
                }
                match connect(*addr) {
                    Ok(channel) => {
                        added += 1;
                        next.push(Backend {
                            addr: Some(*addr),
                            channel,
                        });
                    }
                    Err(e) => warn!(addr = %addr, error = %e, "백엔드 채널 생성 실패"),
                }
            }

            if added > 0 || next.len() != backends.len() {
                debug!(
                    backends = next.len(),
                    added,
                    removed = backends.len() + added - next.len(),
                    "백엔드 목록 갱신"
                );
            }
            *backends = next;
        }

        shared.finish_resolution();
        true
    }

    /// 해석 실패 기록 (대기 중인 요청은 실패로 깨어난다)
    pub(crate) fn resolution_failed(&self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        shared.finish_resolution();
        !shared.is_closed()
    }
}
