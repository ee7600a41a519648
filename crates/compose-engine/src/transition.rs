//! Transition filter catalog.
//!
//! Every transition is an entry effect on a single normalized segment: it
//! runs for `duration_secs` from the segment start and leaves the rest of
//! the segment untouched, so segment durations are preserved.

use anitemp_common::config::NormalizeProfile;
use anitemp_edit_model::Transition;

/// Limited-range black in yuv420p.
const BLACK_YUV: (u8, u8, u8) = (16, 128, 128);

/// Build the `-vf` filter for a transition.
pub fn filter_for(
    transition: Transition,
    duration_secs: f64,
    profile: &NormalizeProfile,
) -> String {
    let d = duration_secs;
    match transition {
        Transition::Fade => format!("fade=t=in:st=0:d={d}"),
        Transition::Dissolve => format!(
            "color=c=black:s={w}x{h}:r={fps}[bg];\
             [in]format=yuva420p,fade=t=in:st=0:d={d}:alpha=1[fg];\
             [bg][fg]overlay=shortest=1,format=yuv420p[out]",
            w = profile.width,
            h = profile.height,
            fps = profile.fps,
        ),
        Transition::WipeLeft => masked(&format!("gte(X,W*(1-T/{d}))"), d),
        Transition::WipeRight => masked(&format!("lte(X,W*T/{d})"), d),
        Transition::SlideLeft => format!(
            "pad=w=iw*2:h=ih:x=iw:y=0:color=black,\
             crop=w=iw/2:h=ih:x='min(iw/2,iw/2*t/{d})':y=0"
        ),
        Transition::SlideRight => format!(
            "pad=w=iw*2:h=ih:x=0:y=0:color=black,\
             crop=w=iw/2:h=ih:x='max(0,iw/2*(1-t/{d}))':y=0"
        ),
        Transition::ZoomIn | Transition::ZoomOut => {
            zoompan(&zoom_expr(transition, frames(d, profile)), profile)
        }
        Transition::CircleCrop => masked("lte(hypot(X-W/2,Y-H/2),min(W,H)/2)", d),
        Transition::CircleOpen => {
            masked(&format!("lte(hypot(X-W/2,Y-H/2),hypot(W/2,H/2)*T/{d})"), d)
        }
        Transition::FadeBlack => format!("fade=t=in:st=0:d={d}:color=black"),
        Transition::FadeWhite => format!("fade=t=in:st=0:d={d}:color=white"),
    }
}

/// Black out every pixel where `visible` is false while `T < d`.
fn masked(visible: &str, d: f64) -> String {
    let (y, u, v) = BLACK_YUV;
    let hidden = format!("lt(T,{d})*not({visible})");
    format!(
        "geq=lum='if({hidden},{y},lum(X,Y))':cb='if({hidden},{u},cb(X,Y))':cr='if({hidden},{v},cr(X,Y))'"
    )
}

/// Zoom factor per output frame `on`. Both settle at 1 from frame `n` on.
fn zoom_expr(transition: Transition, n: u64) -> String {
    match transition {
        // push in to 1.5x at the midpoint, back to 1x by frame n
        Transition::ZoomIn => format!("if(lt(on,{n}),1+0.5*sin(PI*on/{n}),1)"),
        _ => format!("if(lt(on,{n}),1.5-0.5*on/{n},1)"),
    }
}

fn zoompan(zoom: &str, profile: &NormalizeProfile) -> String {
    format!(
        "zoompan=z='{zoom}':d=1:x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':s={}x{}:fps={}",
        profile.width, profile.height, profile.fps
    )
}

/// Transition length in output frames, at least one.
fn frames(duration_secs: f64, profile: &NormalizeProfile) -> u64 {
    ((duration_secs * profile.fps as f64).round() as u64).max(1)
}
