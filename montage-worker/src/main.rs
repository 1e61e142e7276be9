//! Runnable demonstration of the montage worker commission protocol: a
//! worker thread owns a [`MontageProcessor`] fed by a local cache, and the
//! main thread drives it purely through [`CommissionClient`] commissions
//! over a [`BiChannel`], the way a real deployment would split reader/montage
//! work across OS threads.

use montage_core::cache::{LocalSignalCache, SignalCache, SignalDataCache};
use montage_core::montage::{ChannelSource, GetSignalsConfig, Montage, MontageChannel, MontageProcessor};
use montage_core::protocol::{Action, CommissionClient, CommissionRequest, CommissionResponse};
use montage_core::settings::MontageSettings;
use montage_core::sync::BiChannel;
use montage_core::{InterruptionMap, SignalCachePart, SignalPart};

use std::sync::Arc;
use tokio::sync::RwLock;

fn synthetic_eeg(n_samples: usize, sampling_rate: f32) -> SignalPart {
    let data: Vec<f32> = (0..n_samples)
        .map(|i| (i as f32 / sampling_rate * std::f32::consts::TAU * 10.0).sin())
        .collect();
    SignalPart::full(sampling_rate, data)
}

fn build_montage() -> Montage {
    let mut montage = Montage::new("bipolar-demo");
    montage.channels.push(MontageChannel {
        name: "Fp1-F3".to_string(),
        sampling_rate: 256.0,
        active: ChannelSource::Single(0),
        reference: ChannelSource::Single(1),
        averaged: false,
        exclude_active_from_avg: false,
        visible: true,
        highpass: Some(0.5),
        lowpass: Some(40.0),
        notch: None,
        bandreject: None,
    });
    montage
}

/// Worker-side loop: owns the processor, answers commissions as they
/// arrive. Runs on a dedicated OS thread with its own small async runtime,
/// since [`MontageProcessor`]'s getters are async even though every await
/// here resolves immediately against a local cache.
fn run_worker(transport: BiChannel<CommissionRequest, CommissionResponse>) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("worker runtime");

    rt.block_on(async move {
        let mut local = LocalSignalCache::new();
        local
            .insert_signals(&SignalCachePart {
                start: 0.0,
                end: 10.0,
                signals: vec![synthetic_eeg(2560, 256.0), synthetic_eeg(2560, 256.0)],
            })
            .expect("seed cache");

        let settings = Arc::new(MontageSettings::default());
        let mut processor = MontageProcessor::new(build_montage(), settings);
        processor.set_input(Arc::new(RwLock::new(SignalCache::Local(local))));
        let interruptions = InterruptionMap::new();

        log::info!(target: "montage::worker", "worker ready, serving commissions");

        while let Ok(request) = transport.recv() {
            let response = match request.action {
                Action::GetSignals => {
                    let range: (f64, f64) = request
                        .props
                        .get("range")
                        .and_then(|v| serde_json::from_value(v.clone()).ok())
                        .unwrap_or((0.0, 1.0));
                    match processor
                        .get_signals(range.0, range.1, &GetSignalsConfig::default(), &interruptions, 10.0)
                        .await
                    {
                        Ok(part) => CommissionResponse::ok(
                            Action::GetSignals,
                            Some(request.rn),
                            serde_json::to_value(part).unwrap_or(serde_json::Value::Null),
                        ),
                        Err(err) => CommissionResponse::fail(Action::GetSignals, Some(request.rn), err.to_string()),
                    }
                }
                other => CommissionResponse::fail(other, Some(request.rn), "action not implemented by this demo worker"),
            };

            if transport.send(response).is_err() {
                log::warn!(target: "montage::worker", "client disconnected, shutting down");
                break;
            }
        }
    });
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let (client_transport, worker_transport) = BiChannel::bounded::<CommissionResponse, CommissionRequest>(16);
    let client = CommissionClient::new(client_transport);

    let response_client = client.clone();
    std::thread::spawn(move || {
        // Pump responses from the worker into the client's pending table;
        // ordinary channel recv, no runtime needed on this side.
        while let Ok(response) = response_client.transport().recv() {
            response_client.handle_response(response);
        }
    });

    std::thread::spawn(move || run_worker(worker_transport));

    let response = client
        .commission(
            Action::GetSignals,
            serde_json::json!({ "range": [0.0, 5.0] }),
            false,
        )
        .await
        .expect("commission");

    if response.success {
        let part: SignalCachePart = serde_json::from_value(response.payload).expect("decode signals");
        println!(
            "received {} channel(s), {} samples on channel 0",
            part.signals.len(),
            part.signals.first().map(|s| s.data.len()).unwrap_or(0)
        );
    } else {
        eprintln!("commission failed: {:?}", response.error);
    }
}
